pub mod inspect;
pub mod weave;
