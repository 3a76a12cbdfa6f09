//! Gradient checks against central finite differences

mod prop_conv;
mod prop_softmax;
mod test_utils;
