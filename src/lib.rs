#[allow(non_snake_case)]
pub mod CounterflowFlame;
#[allow(non_snake_case)]
pub mod LinearAlgebra;
#[allow(non_snake_case)]
pub mod Parallel;
#[allow(non_snake_case)]
pub mod ReferenceModels;
#[allow(non_snake_case)]
pub mod Utils;
