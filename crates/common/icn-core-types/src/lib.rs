// src/lib.rs for icn-core-types

pub mod cid_model;

pub use cid_model::{Cid, CidError, RAW_CODEC, SHA2_256};
