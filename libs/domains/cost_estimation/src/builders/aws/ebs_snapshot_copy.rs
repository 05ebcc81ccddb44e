//! `aws_ebs_snapshot_copy`
//!
//! Size is read two hops away: `source_snapshot_id` -> `volume_id` -> `size`,
//! defaulting to 8 GB when either hop leaves the graph.

use super::{snapshot_storage_spec, DEFAULT_VOLUME_SIZE_GB};
use crate::builders::{BuildContext, BuildOutput, CostComponent};
use crate::usage::UsageSchema;

pub(super) fn usage_schema() -> UsageSchema {
    UsageSchema::new()
}

pub(super) fn build(ctx: &BuildContext<'_>) -> BuildOutput {
    let size = ctx.references.resolve_decimal(
        ctx.resource,
        &["source_snapshot_id", "volume_id"],
        "size",
        DEFAULT_VOLUME_SIZE_GB,
    );

    BuildOutput::new(vec![
        CostComponent::monthly(
            "EBS snapshot storage",
            "GB",
            snapshot_storage_spec(&ctx.region),
            size.value,
        )
        .with_assumption(size.assumption),
    ])
}
