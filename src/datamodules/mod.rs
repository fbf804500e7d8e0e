pub mod ucmerced;

pub use ucmerced::UcMercedDataModule;
