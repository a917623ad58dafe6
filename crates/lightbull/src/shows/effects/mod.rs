// Copyright (c) 2024 Damir Jelić
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use std::{fmt::Debug, time::Duration};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use super::parameters::{Parameter, ParameterError};
use crate::hardware::LedStrip;

pub mod blink;
pub mod calibration;
pub mod rainbow;
pub mod single_color;
pub mod stripes;
mod utils;

pub use blink::BlinkEffect;
pub use calibration::CalibrationEffect;
pub use rainbow::RainbowEffect;
pub use single_color::SingleColorEffect;
pub use stripes::StripesEffect;

/// The stable identifiers of the available effects.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EffectKind {
    SingleColor,
    Blink,
    Stripes,
    Rainbow,
    Calibration,
}

/// A colored pattern drawn onto a set of LED parts, advanced frame by frame.
///
/// Effects are driven by the render loop through [`Effect::update`] with the
/// wall-clock time since the previous frame. An effect may keep integration
/// state between frames (a phase, a position); that state starts at zero on
/// construction and is never serialized. Everything an operator can change is
/// exposed as a [`Parameter`].
pub trait Effect: Debug + Send + Sync {
    /// The stable identifier, like `blink`.
    fn kind(&self) -> EffectKind;

    /// A human readable name, like `Blink`.
    fn name(&self) -> &'static str;

    /// Draw one frame onto the given parts. `delta` is the time that passed
    /// since the previous frame.
    fn update(&mut self, leds: &mut LedStrip, parts: &[&str], delta: Duration);

    /// The parameters of the effect, in their fixed schedule order.
    fn parameters(&self) -> Vec<&Parameter>;

    fn parameters_mut(&mut self) -> Vec<&mut Parameter>;
}

/// Construct a fresh effect of the given kind with default parameter values.
pub fn new_effect(kind: EffectKind) -> Box<dyn Effect> {
    match kind {
        EffectKind::SingleColor => Box::new(SingleColorEffect::new()),
        EffectKind::Blink => Box::new(BlinkEffect::new()),
        EffectKind::Stripes => Box::new(StripesEffect::new()),
        EffectKind::Rainbow => Box::new(RainbowEffect::new()),
        EffectKind::Calibration => Box::new(CalibrationEffect::new()),
    }
}

/// The type and display name of every available effect, for the
/// configuration endpoint.
pub fn effect_names() -> Vec<(EffectKind, &'static str)> {
    EffectKind::iter()
        .map(|kind| (kind, new_effect(kind).name()))
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum EffectError {
    #[error("stored parameter {0:?} does not exist in the effect")]
    UnknownParameter(String),
    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

/// The serialized form of an effect: the type discriminator plus the
/// parameter blobs. Integration state is deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectJson {
    #[serde(rename = "type")]
    pub kind: EffectKind,
    pub parameters: Vec<Parameter>,
}

/// Serialize an effect into its on-disk and on-wire form.
pub fn to_json(effect: &dyn Effect) -> EffectJson {
    EffectJson {
        kind: effect.kind(),
        parameters: effect.parameters().into_iter().cloned().collect(),
    }
}

/// Rebuild an effect from its serialized form.
///
/// A fresh effect of the stored kind is constructed and the stored parameter
/// blobs are matched onto it by key, restoring identities, values and links.
pub fn from_json(json: EffectJson) -> Result<Box<dyn Effect>, EffectError> {
    let mut effect = new_effect(json.kind);

    for stored in json.parameters {
        let parameter = effect
            .parameters_mut()
            .into_iter()
            .find(|parameter| parameter.key() == stored.key())
            .ok_or_else(|| EffectError::UnknownParameter(stored.key().to_owned()))?;

        parameter.restore(stored)?;
    }

    Ok(effect)
}

#[cfg(test)]
mod test {
    use similar_asserts::assert_eq;

    use super::*;
    use crate::shows::parameters::{ParameterType, Value};

    #[test]
    fn kind_identifiers_are_stable() {
        assert_eq!(EffectKind::SingleColor.to_string(), "singlecolor");
        assert_eq!(EffectKind::Blink.to_string(), "blink");
        assert_eq!(EffectKind::Stripes.to_string(), "stripes");
        assert_eq!(EffectKind::Rainbow.to_string(), "rainbow");
        assert_eq!(EffectKind::Calibration.to_string(), "calibration");

        assert_eq!(
            serde_json::to_value(EffectKind::SingleColor).unwrap(),
            serde_json::json!("singlecolor"),
            "The serde form should match the display form"
        );
    }

    #[test]
    fn factory_builds_every_kind() {
        for (kind, name) in effect_names() {
            let effect = new_effect(kind);
            assert_eq!(effect.kind(), kind);
            assert_eq!(effect.name(), name);
            assert!(
                !effect.parameters().is_empty(),
                "Every effect should expose at least one parameter"
            );
        }
    }

    #[test]
    fn serialization_round_trip_restores_parameters() {
        let mut effect = new_effect(EffectKind::Blink);

        let speed = effect
            .parameters_mut()
            .into_iter()
            .find(|p| p.key() == "speed")
            .expect("The blink effect should have a speed parameter");
        speed
            .set_current(Value::Integer(42))
            .expect("We should be able to set the speed");
        let speed_id = speed.id();

        let json = serde_json::to_value(to_json(effect.as_ref()))
            .expect("We should be able to serialize an effect");
        assert_eq!(json["type"], "blink");

        let restored = from_json(
            serde_json::from_value(json).expect("We should be able to parse the effect JSON"),
        )
        .expect("We should be able to rebuild the effect");

        let speed = restored
            .parameters()
            .into_iter()
            .find(|p| p.key() == "speed")
            .expect("The restored effect should still have a speed parameter");
        assert_eq!(speed.id(), speed_id, "Parameter identities should survive");
        assert_eq!(speed.current(), Value::Integer(42));
        assert_eq!(speed.param_type(), ParameterType::Percent);
    }

    #[test]
    fn unknown_stored_parameter_is_rejected() {
        let mut json = to_json(new_effect(EffectKind::SingleColor).as_ref());
        json.parameters = vec![Parameter::new("nope", ParameterType::Boolean, "Nope")];

        from_json(json).expect_err("A stored parameter without a schema slot should be rejected");
    }
}
