pub mod parameters;

pub use parameters::{
    Error, FromParameter, Parameter, ParameterMap, ParameterTree, ParameterValue, parse_string,
    parse_table,
};
