mod common;
mod eligibility;
mod risk;
mod routing;
