#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
pub mod cosmology;
pub mod data_loading;
pub mod fitting;
pub mod numerical;
