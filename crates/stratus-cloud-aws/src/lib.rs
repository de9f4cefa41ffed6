//! Stratus AWS Provider
//!
//! Elastic IP driver for Amazon EC2. Address primitives go through
//! [`Ec2Api`]; [`SdkEc2`] is the `aws-sdk-ec2` implementation used in
//! production, tests substitute a fake.
//!
//! ```text
//! AwsEip (CloudEip) ──▶ AwsRegion ──▶ Ec2Api ──▶ EC2
//!        │
//!        └── reconcile::wait_until after associate / dissociate
//! ```

pub mod ec2;
pub mod eip;
pub mod error;
pub mod region;

#[cfg(test)]
mod testing;

pub use ec2::{Ec2Address, Ec2Api, SdkEc2};
pub use eip::AwsEip;
pub use error::{AwsError, Result};
pub use region::AwsRegion;
