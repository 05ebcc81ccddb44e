//! `aws_instance`
//!
//! Defaults: `instance_type` = `t3.micro`, tenancy shared, Linux on-demand.
//! Detailed monitoring bills 7 metrics. Block devices default to 8 GB gp2
//! and are reported as sub-resources.

use rust_decimal_macros::dec;
use std::collections::BTreeMap;

use super::{ec2_spec, volume_components, VolumeSpec};
use crate::builders::{BuildContext, BuildOutput, CostComponent, SubResource};
use crate::models::AttributeValue;
use crate::price_spec::PriceSpec;
use crate::usage::{UsageKey, UsageSchema};

const DEFAULT_INSTANCE_TYPE: &str = "t3.micro";

pub(super) fn usage_schema() -> UsageSchema {
    UsageSchema::new().key(UsageKey::decimal("monthly_cpu_credit_hrs", "vCPU-hours"))
}

/// t3, t3a and t4g run unlimited unless told otherwise; t2 defaults to standard.
fn unlimited_credits(instance_family: &str, cpu_credits: Option<&str>) -> bool {
    match cpu_credits {
        Some(mode) => mode == "unlimited" && is_burstable(instance_family),
        None => matches!(instance_family, "t3" | "t3a" | "t4g"),
    }
}

fn is_burstable(instance_family: &str) -> bool {
    matches!(instance_family, "t2" | "t3" | "t3a" | "t4g")
}

fn block_device(
    name: String,
    block: &BTreeMap<String, AttributeValue>,
    region: &str,
) -> SubResource {
    let volume = VolumeSpec::from_lookup(
        |k| block.get(k).and_then(AttributeValue::as_str),
        |k| block.get(k).and_then(AttributeValue::as_decimal),
    );
    SubResource {
        name,
        resource_type: "aws_ebs_volume".to_string(),
        components: volume_components(&volume, region, None),
    }
}

pub(super) fn build(ctx: &BuildContext<'_>) -> BuildOutput {
    let resource = ctx.resource;
    let region = ctx.region.as_str();
    let instance_type = resource.str_attr("instance_type").unwrap_or(DEFAULT_INSTANCE_TYPE);
    let instance_family = instance_type.split('.').next().unwrap_or_default();
    let tenancy = match resource.str_attr("tenancy") {
        Some("dedicated") => "Dedicated",
        Some("host") => "Host",
        _ => "Shared",
    };

    let mut components = vec![CostComponent::hourly(
        format!("Instance usage (Linux/UNIX, on-demand, {instance_type})"),
        "hours",
        ec2_spec("Compute Instance", region)
            .product_attr("instanceType", instance_type)
            .product_attr("tenancy", tenancy)
            .product_attr("operatingSystem", "Linux")
            .product_attr("preInstalledSw", "NA")
            .product_attr("capacitystatus", "Used")
            .price_attr("purchaseOption", "on_demand"),
        dec!(1),
    )];

    if resource.bool_attr("monitoring") == Some(true) {
        components.push(CostComponent::monthly(
            "EC2 detailed monitoring",
            "metrics",
            PriceSpec::new("AmazonCloudWatch", "Metric")
                .product_attr("region", region)
                .product_attr("usagetype", "/CW:MetricMonitorUsage/"),
            dec!(7),
        ));
    }

    let cpu_credits = resource
        .attribute("credit_specification")
        .and_then(|spec| spec.blocks().into_iter().next())
        .and_then(|block| block.get("cpu_credits"))
        .and_then(AttributeValue::as_str);
    if unlimited_credits(instance_family, cpu_credits) {
        let operating_system = if instance_family == "t4g" { "Linux" } else { "Linux/UNIX" };
        components.push(ctx.usage_component(
            "CPU credits",
            ec2_spec("CPU Credits", region)
                .product_attr("operatingSystem", operating_system)
                .product_attr("usagetype", format!("/CPUCredits:{instance_family}/")),
            "monthly_cpu_credit_hrs",
        ));
    }

    let mut sub_resources = Vec::new();
    let root = resource
        .attribute("root_block_device")
        .map(AttributeValue::blocks)
        .unwrap_or_default();
    let empty = BTreeMap::new();
    sub_resources.push(block_device(
        "root_block_device".to_string(),
        root.first().copied().unwrap_or(&empty),
        region,
    ));
    if let Some(devices) = resource.attribute("ebs_block_device") {
        for (i, block) in devices.blocks().into_iter().enumerate() {
            let name = match block.get("device_name").and_then(AttributeValue::as_str) {
                Some(device) => format!("ebs_block_device[{device}]"),
                None => format!("ebs_block_device[{i}]"),
            };
            sub_resources.push(block_device(name, block, region));
        }
    }

    BuildOutput {
        components,
        sub_resources,
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{build, component, names};
    use super::*;
    use crate::builders::{Quantity, TimeBasis};
    use crate::models::{Resource, ResourceGraph};

    fn block(entries: &[(&str, AttributeValue)]) -> AttributeValue {
        AttributeValue::Block(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn test_defaults() {
        let graph = ResourceGraph::default();
        let instance = Resource::new("aws_instance.web", "aws_instance");

        let output = build(&graph, &instance);

        let usage = component(&output, "Instance usage (Linux/UNIX, on-demand, t3.micro)");
        assert_eq!(usage.time_basis, TimeBasis::Hourly);
        assert_eq!(usage.quantity, Quantity::Fixed(dec!(1)));
        assert_eq!(usage.price_spec.product.attributes["tenancy"], "Shared");
        assert_eq!(usage.price_spec.price.attributes["purchaseOption"], "on_demand");

        // t3 runs unlimited by default
        assert!(names(&output).contains(&"CPU credits"));

        assert_eq!(output.sub_resources.len(), 1);
        let root = &output.sub_resources[0];
        assert_eq!(root.name, "root_block_device");
        assert_eq!(root.components[0].quantity, Quantity::Fixed(dec!(8)));
    }

    #[test]
    fn test_t2_standard_credits_are_not_billed() {
        let graph = ResourceGraph::default();
        let instance = Resource::new("aws_instance.old", "aws_instance")
            .with_attribute("instance_type", "t2.micro");
        assert!(!names(&build(&graph, &instance)).contains(&"CPU credits"));

        let unlimited = Resource::new("aws_instance.burst", "aws_instance")
            .with_attribute("instance_type", "t2.micro")
            .with_attribute(
                "credit_specification",
                AttributeValue::List(vec![block(&[("cpu_credits", "unlimited".into())])]),
            );
        assert!(names(&build(&graph, &unlimited)).contains(&"CPU credits"));
    }

    #[test]
    fn test_non_burstable_has_no_credits() {
        let graph = ResourceGraph::default();
        let instance = Resource::new("aws_instance.big", "aws_instance")
            .with_attribute("instance_type", "m5.large")
            .with_attribute("tenancy", "dedicated");

        let output = build(&graph, &instance);

        assert_eq!(names(&output), vec!["Instance usage (Linux/UNIX, on-demand, m5.large)"]);
        assert_eq!(output.components[0].price_spec.product.attributes["tenancy"], "Dedicated");
    }

    #[test]
    fn test_monitoring_and_block_devices() {
        let graph = ResourceGraph::default();
        let instance = Resource::new("aws_instance.app", "aws_instance")
            .with_attribute("instance_type", "m5.large")
            .with_attribute("monitoring", true)
            .with_attribute(
                "root_block_device",
                block(&[("volume_size", 50.into()), ("volume_type", "gp3".into())]),
            )
            .with_attribute(
                "ebs_block_device",
                AttributeValue::List(vec![block(&[
                    ("device_name", "/dev/sdf".into()),
                    ("volume_type", "io1".into()),
                    ("volume_size", 100.into()),
                    ("iops", 400.into()),
                ])]),
            );

        let output = build(&graph, &instance);

        assert_eq!(
            component(&output, "EC2 detailed monitoring").quantity,
            Quantity::Fixed(dec!(7))
        );
        assert_eq!(output.sub_resources.len(), 2);
        assert_eq!(
            output.sub_resources[0].components[0].name,
            "Storage (general purpose SSD, gp3)"
        );
        assert_eq!(output.sub_resources[0].components[0].quantity, Quantity::Fixed(dec!(50)));
        let data = &output.sub_resources[1];
        assert_eq!(data.name, "ebs_block_device[/dev/sdf]");
        assert_eq!(data.components.len(), 2);
        assert_eq!(data.components[1].quantity, Quantity::Fixed(dec!(400)));
    }
}
