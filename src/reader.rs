pub mod gff;
pub use gff::FeatureKind;
pub use gff::FeatureRecord;
pub use gff::MalformedLineError;
pub use gff::Strand;
