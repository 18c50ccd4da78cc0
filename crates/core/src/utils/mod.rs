pub mod scaled_math;
