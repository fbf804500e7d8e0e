//! The UC Merced Land Use dataset for [dfdx]: download, verify, extract and
//! load the three splits, and batch them as tensors.

pub mod datamodules;
pub mod datasets;
