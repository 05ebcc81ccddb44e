//! AWS resource types.
//!
//! Fallback defaults used when an attribute or reference cannot be resolved
//! are documented on each builder.

mod ebs_snapshot;
mod ebs_snapshot_copy;
mod ebs_volume;
mod instance;
mod nat_gateway;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::BuilderRegistry;
use crate::price_spec::PriceSpec;

pub use ebs_volume::{volume_components, VolumeSpec};

/// Volume size assumed when neither the resource nor its references say.
pub const DEFAULT_VOLUME_SIZE_GB: Decimal = dec!(8);

const EC2: &str = "AmazonEC2";

pub fn register(registry: &mut BuilderRegistry) {
    registry.register("aws_ebs_volume", ebs_volume::build, ebs_volume::usage_schema());
    registry.register("aws_ebs_snapshot", ebs_snapshot::build, ebs_snapshot::usage_schema());
    registry.register(
        "aws_ebs_snapshot_copy",
        ebs_snapshot_copy::build,
        ebs_snapshot_copy::usage_schema(),
    );
    registry.register("aws_instance", instance::build, instance::usage_schema());
    registry.register("aws_nat_gateway", nat_gateway::build, nat_gateway::usage_schema());
}

/// EC2 product filter scoped to a region.
fn ec2_spec(product_family: &str, region: &str) -> PriceSpec {
    PriceSpec::new(EC2, product_family).product_attr("region", region)
}

/// Snapshot storage, shared by snapshots and snapshot copies.
fn snapshot_storage_spec(region: &str) -> PriceSpec {
    ec2_spec("Storage Snapshot", region).product_attr("usagetype", "/EBS:SnapshotUsage$/")
}
