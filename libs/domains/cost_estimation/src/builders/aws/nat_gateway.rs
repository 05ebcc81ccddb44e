//! `aws_nat_gateway`

use rust_decimal_macros::dec;

use super::ec2_spec;
use crate::builders::{BuildContext, BuildOutput, CostComponent};
use crate::usage::{UsageKey, UsageSchema};

pub(super) fn usage_schema() -> UsageSchema {
    UsageSchema::new().key(UsageKey::decimal("monthly_data_processed_gb", "GB"))
}

pub(super) fn build(ctx: &BuildContext<'_>) -> BuildOutput {
    let region = ctx.region.as_str();
    BuildOutput::new(vec![
        CostComponent::hourly(
            "NAT gateway",
            "hours",
            ec2_spec("NAT Gateway", region).product_attr("usagetype", "/NatGateway-Hours/"),
            dec!(1),
        ),
        ctx.usage_component(
            "Data processed",
            ec2_spec("NAT Gateway", region).product_attr("usagetype", "/NatGateway-Bytes/"),
            "monthly_data_processed_gb",
        ),
    ])
}
