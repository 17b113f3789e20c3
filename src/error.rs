use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
	#[error("markup rejected by the parser: {0}")]
	Parse(String),

	#[error("region lost its place in the output tree")]
	Detached,

	#[error("placeholder {0} refers to no expression")]
	MissingExpression(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
