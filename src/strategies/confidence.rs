use crate::data::types::Ensemble;
use crate::execution::types::Settings;
use crate::strategies::types::{Confidence, Signal};

/// Grade a signal from inter-model agreement and edge magnitude: HIGH when
/// both hold, MED when exactly one does, LOW otherwise. Agreement is false
/// when either model produced no members this cycle.
pub fn grade(signal: &Signal, ensemble: &Ensemble, settings: &Settings) -> Confidence {
    let agreement = match (ensemble.gfs_mean, ensemble.ecmwf_mean) {
        (Some(gfs), Some(ecmwf)) => Some((gfs - ecmwf).abs()),
        _ => None,
    };
    let models_agree = agreement.map_or(false, |d| d <= settings.model_agreement_threshold);
    let strong_edge = signal.edge_strength >= settings.min_edge * 2.0;

    match (models_agree, strong_edge) {
        (true, true) => Confidence::High,
        (true, false) | (false, true) => Confidence::Med,
        (false, false) => Confidence::Low,
    }
}
