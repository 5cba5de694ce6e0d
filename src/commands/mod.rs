pub mod convert;
pub mod parse;
pub mod plot;
pub mod replace_hr;
pub mod strip_hr;
