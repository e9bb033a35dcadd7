/*!
This crate turns raw trip records into the numeric matrix the classifier consumes. The [`FeatureTransformer`](struct.FeatureTransformer.html) derives the fixed feature columns from raw fields, and the [`EncoderRegistry`](struct.EncoderRegistry.html) label encodes the categorical columns and scales every column. The registry is fit once on the training set and then applied unchanged.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod label_encoder;
mod registry;
mod standard_scaler;
mod transformer;

pub use self::label_encoder::{LabelEncoder, FALLBACK_CLASS};
pub use self::registry::{EncoderRegistry, NotFittedError};
pub use self::standard_scaler::{ScaledColumn, StandardScaler};
pub use self::transformer::*;
