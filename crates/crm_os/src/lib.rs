#![forbid(unsafe_code)]

pub mod contactfield;
pub mod mail_lang;
