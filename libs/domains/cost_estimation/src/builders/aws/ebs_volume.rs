//! `aws_ebs_volume`
//!
//! Defaults: `type` = `gp2`, `size` = 8 GB, `iops` = 100 for io1/io2,
//! gp3 includes 3000 IOPS and 125 MBps before provisioned extras are billed.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{ec2_spec, DEFAULT_VOLUME_SIZE_GB};
use crate::builders::{BuildContext, BuildOutput, CostComponent};
use crate::usage::{UsageKey, UsageSchema};

const GP3_INCLUDED_IOPS: Decimal = dec!(3000);
const GP3_INCLUDED_THROUGHPUT: Decimal = dec!(125);
const DEFAULT_PROVISIONED_IOPS: Decimal = dec!(100);

pub(super) fn usage_schema() -> UsageSchema {
    UsageSchema::new().key(UsageKey::integer("monthly_standard_io_requests", "requests"))
}

/// Attributes that determine a volume's cost.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeSpec {
    pub volume_type: String,
    pub size_gb: Decimal,
    pub iops: Option<Decimal>,
    pub throughput: Option<Decimal>,
}

impl VolumeSpec {
    /// Read `type`/`volume_type`, `size`/`volume_size`, `iops` and
    /// `throughput` from an attribute lookup.
    pub fn from_lookup<'a>(
        text: impl Fn(&str) -> Option<&'a str>,
        number: impl Fn(&str) -> Option<Decimal>,
    ) -> Self {
        Self {
            volume_type: text("type")
                .or_else(|| text("volume_type"))
                .unwrap_or("gp2")
                .to_string(),
            size_gb: number("size")
                .or_else(|| number("volume_size"))
                .unwrap_or(DEFAULT_VOLUME_SIZE_GB),
            iops: number("iops"),
            throughput: number("throughput"),
        }
    }
}

fn storage_label(volume_type: &str) -> String {
    let kind = match volume_type {
        "gp2" | "gp3" => "general purpose SSD",
        "io1" | "io2" => "provisioned IOPS SSD",
        "st1" => "throughput optimized HDD",
        "sc1" => "cold HDD",
        "standard" => "magnetic",
        _ => "unknown",
    };
    format!("Storage ({kind}, {volume_type})")
}

/// Components for one EBS volume; also used for instance block devices.
pub fn volume_components(
    volume: &VolumeSpec,
    region: &str,
    io_usage_key: Option<&str>,
) -> Vec<CostComponent> {
    let volume_type = volume.volume_type.as_str();
    let mut components = vec![CostComponent::monthly(
        storage_label(volume_type),
        "GB",
        ec2_spec("Storage", region).product_attr("volumeApiName", volume_type),
        volume.size_gb,
    )];

    match volume_type {
        "io1" | "io2" => {
            components.push(CostComponent::monthly(
                "Provisioned IOPS",
                "IOPS",
                ec2_spec("System Operation", region)
                    .product_attr("volumeApiName", volume_type)
                    .product_attr(
                        "usagetype",
                        format!("/EBS:VolumeP-IOPS.{}/", piops_suffix(volume_type)),
                    ),
                volume.iops.unwrap_or(DEFAULT_PROVISIONED_IOPS),
            ));
        }
        "gp3" => {
            let extra_iops = volume.iops.unwrap_or(GP3_INCLUDED_IOPS) - GP3_INCLUDED_IOPS;
            if extra_iops > Decimal::ZERO {
                components.push(CostComponent::monthly(
                    "Provisioned IOPS",
                    "IOPS",
                    ec2_spec("System Operation", region)
                        .product_attr("volumeApiName", "gp3")
                        .product_attr("usagetype", "/EBS:VolumeP-IOPS.gp3/"),
                    extra_iops,
                ));
            }
            let extra_throughput =
                volume.throughput.unwrap_or(GP3_INCLUDED_THROUGHPUT) - GP3_INCLUDED_THROUGHPUT;
            if extra_throughput > Decimal::ZERO {
                components.push(CostComponent::monthly(
                    "Provisioned throughput",
                    "MBps",
                    ec2_spec("Provisioned Throughput", region)
                        .product_attr("volumeApiName", "gp3")
                        .product_attr("usagetype", "/EBS:VolumeP-Throughput.gp3/"),
                    extra_throughput,
                ));
            }
        }
        "standard" => {
            if let Some(key) = io_usage_key {
                components.push(
                    CostComponent::usage(
                        "I/O requests",
                        "1M request",
                        ec2_spec("System Operation", region)
                            .product_attr("volumeApiName", "standard")
                            .product_attr("usagetype", "/EBS:VolumeIOUsage/"),
                        key,
                    )
                    .with_unit_multiplier(dec!(1000000)),
                );
            }
        }
        _ => {}
    }

    components
}

fn piops_suffix(volume_type: &str) -> &'static str {
    if volume_type == "io2" { "io2" } else { "piops" }
}

pub(super) fn build(ctx: &BuildContext<'_>) -> BuildOutput {
    let resource = ctx.resource;
    let volume = VolumeSpec::from_lookup(|k| resource.str_attr(k), |k| resource.decimal_attr(k));
    BuildOutput::new(volume_components(
        &volume,
        &ctx.region,
        Some("monthly_standard_io_requests"),
    ))
}
