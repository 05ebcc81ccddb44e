//! `aws_ebs_snapshot`
//!
//! Snapshot size is the backing volume's `size` reached through `volume_id`.
//! When the volume is outside the graph the size defaults to 8 GB and the
//! storage component is marked as estimated.

use rust_decimal_macros::dec;

use super::{ec2_spec, snapshot_storage_spec, DEFAULT_VOLUME_SIZE_GB};
use crate::builders::{BuildContext, BuildOutput, CostComponent};
use crate::price_spec::PriceSpec;
use crate::usage::{UsageKey, UsageSchema};

pub(super) fn usage_schema() -> UsageSchema {
    UsageSchema::new()
        .key(UsageKey::integer("monthly_list_block_requests", "requests"))
        .key(UsageKey::integer("monthly_get_block_requests", "requests"))
        .key(UsageKey::integer("monthly_put_block_requests", "requests"))
}

fn direct_api_spec(region: &str, operation: &str, price_unit: &str) -> PriceSpec {
    ec2_spec("EBS direct API Requests", region)
        .product_attr("usagetype", format!("/EBS:directAPI.snapshot.{operation}$/"))
        .price_attr("unit", price_unit)
}

pub(super) fn build(ctx: &BuildContext<'_>) -> BuildOutput {
    let region = ctx.region.as_str();
    let size = ctx
        .references
        .resolve_decimal(ctx.resource, &["volume_id"], "size", DEFAULT_VOLUME_SIZE_GB);

    let mut components = vec![
        CostComponent::monthly(
            "EBS snapshot storage",
            "GB",
            snapshot_storage_spec(region),
            size.value,
        )
        .with_assumption(size.assumption),
        CostComponent::hourly(
            "Fast snapshot restore",
            "DSU-hours",
            ec2_spec("Fast Snapshot Restore", region)
                .product_attr("usagetype", "/EBS:FastSnapshotRestore$/"),
            dec!(1),
        ),
    ];

    let requests = [
        (
            "ListChangedBlocks & ListSnapshotBlocks API requests",
            "List",
            "Requests",
            "monthly_list_block_requests",
        ),
        (
            "GetSnapshotBlock API requests",
            "Get",
            "SnapshotAPIUnits",
            "monthly_get_block_requests",
        ),
        (
            "PutSnapshotBlock API requests",
            "Put",
            "SnapshotAPIUnits",
            "monthly_put_block_requests",
        ),
    ];
    components.extend(requests.into_iter().map(|(name, operation, price_unit, key)| {
        CostComponent::usage(
            name,
            "1k requests",
            direct_api_spec(region, operation, price_unit),
            key,
        )
        .with_unit_multiplier(dec!(1000))
    }));

    BuildOutput::new(components)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{build, component, names};
    use crate::builders::{Quantity, TimeBasis};
    use crate::models::{AttributeValue, Resource, ResourceGraph};
    use rust_decimal_macros::dec;

    fn graph() -> ResourceGraph {
        ResourceGraph::new(vec![
            Resource::new("aws_ebs_volume.gp2", "aws_ebs_volume")
                .with_attribute("availability_zone", "us-east-1a")
                .with_attribute("size", 10),
            Resource::new("aws_ebs_snapshot.gp2", "aws_ebs_snapshot")
                .with_attribute("volume_id", AttributeValue::reference("aws_ebs_volume.gp2")),
        ])
        .unwrap()
    }

    #[test]
    fn test_component_set() {
        let graph = graph();
        let output = build(&graph, graph.get("aws_ebs_snapshot.gp2").unwrap());

        assert_eq!(
            names(&output),
            vec![
                "EBS snapshot storage",
                "Fast snapshot restore",
                "ListChangedBlocks & ListSnapshotBlocks API requests",
                "GetSnapshotBlock API requests",
                "PutSnapshotBlock API requests",
            ]
        );
    }

    #[test]
    fn test_storage_size_follows_volume() {
        let graph = graph();
        let output = build(&graph, graph.get("aws_ebs_snapshot.gp2").unwrap());

        let storage = component(&output, "EBS snapshot storage");
        assert_eq!(storage.quantity, Quantity::Fixed(dec!(10)));
        assert!(storage.assumption.is_none());
    }

    #[test]
    fn test_external_volume_assumes_default_size() {
        let graph = graph();
        let snapshot =
            Resource::new("aws_ebs_snapshot.ext", "aws_ebs_snapshot")
                .with_attribute("volume_id", "fake");

        let output = build(&graph, &snapshot);

        let storage = component(&output, "EBS snapshot storage");
        assert_eq!(storage.quantity, Quantity::Fixed(dec!(8)));
        assert!(storage.assumption.is_some());
    }

    #[test]
    fn test_fast_restore_is_hourly() {
        let graph = graph();
        let output = build(&graph, graph.get("aws_ebs_snapshot.gp2").unwrap());

        let restore = component(&output, "Fast snapshot restore");
        assert_eq!(restore.time_basis, TimeBasis::Hourly);
        assert_eq!(restore.quantity, Quantity::Fixed(dec!(1)));
    }

    #[test]
    fn test_get_and_put_share_price_filter() {
        let graph = graph();
        let output = build(&graph, graph.get("aws_ebs_snapshot.gp2").unwrap());

        let get = component(&output, "GetSnapshotBlock API requests").price_spec.hash();
        let put = component(&output, "PutSnapshotBlock API requests").price_spec.hash();
        let list = component(&output, "ListChangedBlocks & ListSnapshotBlocks API requests")
            .price_spec
            .hash();

        let price_half = |h: &crate::price_spec::PriceHash| {
            h.as_str().split('-').nth(1).unwrap().to_string()
        };
        assert_eq!(price_half(&get), price_half(&put));
        assert_ne!(price_half(&get), price_half(&list));
        assert_ne!(get, put);
    }
}
