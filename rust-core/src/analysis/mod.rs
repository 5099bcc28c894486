//! Mirnov probe analysis stages

pub mod duration;
pub mod bandpass;
pub mod peaks;
pub mod phase;
pub mod spline;
pub mod spatial;

pub use duration::{DurationDetector, DurationEstimate};
pub use bandpass::{BandpassSmoother, ChannelDiagnostic, FilteredWindow};
pub use peaks::{PeakColumns, PeakExtractor, PeakRecord};
pub use phase::{LinearFit, PhaseAnalyzer, PhaseFitResult, ProbeLayout, ReferencePoint};
pub use spline::PeriodicSpline;
pub use spatial::{SpatialDecomposer, SpatialStructure, SvdResult};

// End-to-end run over a synthetic rotating m=1 mode
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::data::ChannelMatrix;
    use crate::spectrum::{SpectralEstimator, SpectrogramParams};
    use ndarray::{Array1, Array2};
    use std::f64::consts::PI;

    const FS: f64 = 200_000.0;
    const F_MODE: f64 = 10_000.0;

    /// 12 poloidal probes, each lagging the previous by 30 degrees, plus
    /// out-of-band interference at 47 kHz. Time in seconds.
    fn rotating_mode(samples: usize) -> ChannelMatrix {
        let time = Array1::from_iter((0..samples).map(|i| i as f64 / FS));
        let data = Array2::from_shape_fn((12, samples), |(ch, i)| {
            let t = i as f64 / FS;
            0.3 * (2.0 * PI * F_MODE * t - ch as f64 * PI / 6.0).sin()
                + 0.05 * (2.0 * PI * 47_000.0 * t).sin()
        });
        ChannelMatrix::new(data, time, FS).unwrap()
    }

    #[test]
    fn test_robust_phase_recovers_mode_number() {
        let config = AnalysisConfig::default();
        let matrix = rotating_mode(4000);

        let window = BandpassSmoother::new(config.wavelet.clone(), config.savgol.clone())
            .apply(&matrix, 0.0, 1.0, F_MODE, 3_000.0)
            .unwrap();
        assert_eq!(window.num_channels(), 12);
        assert!(window.diagnostics.is_empty());

        let time_ms = window.time.mapv(|t| t * 1000.0);
        let peaks = PeakExtractor::new(config.peaks.clone())
            .extract(time_ms.view(), window.channel_major(), None)
            .unwrap();
        assert!(peaks.iter().any(|p| p.channel == 12));

        // Channel 1 crest near 10 ms, channel 12 crest 11/12 of a period later
        let t_first = 10.025;
        let t_last = t_first + 11.0 / 12.0 * 1000.0 / F_MODE;
        let fit = PhaseAnalyzer::robust(
            &peaks,
            ReferencePoint::new(t_first, 1.0),
            ReferencePoint::new(t_last, 12.0),
            F_MODE,
            12,
            &[],
        )
        .unwrap();

        assert_eq!(fit.len(), 12);
        assert!((fit.reference_times[0] - t_first).abs() < 0.006);

        let line = LinearFit::fit(&fit.angles, &fit.phase_diffs).unwrap();
        assert!((line.slope - 1.0).abs() < 0.1, "slope {}", line.slope);
        assert!(line.r_squared > 0.98, "r2 {}", line.r_squared);
    }

    #[test]
    fn test_filtered_window_has_two_dominant_modes() {
        let matrix = rotating_mode(2000);
        let window = BandpassSmoother::default()
            .apply(&matrix, 0.0, 1.0, F_MODE, 3_000.0)
            .unwrap();

        let decomposer = SpatialDecomposer::default();
        let svd = decomposer.decompose(window.channel_major()).unwrap();
        assert_eq!(svd.u.dim(), (12, 12));
        assert_eq!(svd.vt.dim(), (12, 2000));

        // A travelling wave is a sine and cosine pair
        assert!(svd.s[2] < 0.1 * svd.s[1]);
        let energy = svd.energy_fractions();
        assert!(energy[0] + energy[1] > 0.98);

        let structure = decomposer.reconstruct(svd.u.column(0), 12).unwrap();
        assert_eq!(structure.probe_positions.len(), 12);
        assert_eq!(structure.smoothed_curve.len(), 200);
    }

    #[test]
    fn test_spectrogram_of_filtered_channel_peaks_at_mode() {
        let matrix = rotating_mode(4000);
        let window = BandpassSmoother::default()
            .apply(&matrix, 0.0, 1.0, F_MODE, 3_000.0)
            .unwrap();
        let channel = window.data.column(0).to_vec();

        let spec = SpectralEstimator::default()
            .compute(&channel, FS, &SpectrogramParams::default())
            .unwrap();
        let middle = spec.power.column(spec.times.len() / 2);
        let (peak_bin, _) = middle
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .unwrap();
        assert!((spec.frequencies[peak_bin] - F_MODE).abs() <= FS / 512.0);
    }
}
