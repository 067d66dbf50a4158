pub mod classifier;
pub mod key;

pub use classifier::{
    Classified, ClassifierPolicy, ClassifyError, Emission, FieldClassifier, Gauge, Representation,
    UnexpectedField,
};
pub use key::metric_key;
