//! Python bindings for the analysis engine

use numpy::{IntoPyArray, PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use ndarray::Array2;

use super::{degenerate_to_none, to_py_err};
use crate::analysis::{
    BandpassSmoother, DurationDetector, LinearFit, PeakExtractor, PeakRecord, PhaseAnalyzer,
    ProbeLayout, ReferencePoint, SpatialDecomposer,
};
use crate::config::{AnalysisConfig, SpectrogramConfig};
use crate::error::AnalysisError;
use crate::filters::WindowType;
use crate::spectrum::{SpectralEstimator, SpectrogramParams};

type Array1Py<'py> = &'py PyArray1<f64>;
type Array2Py<'py> = &'py PyArray2<f64>;

fn points_to_array(points: &[[f64; 2]]) -> Array2<f64> {
    Array2::from_shape_fn((points.len(), 2), |(i, j)| points[i][j])
}

/// Signal processing engine exposed to Python
///
/// All methods are pure: inputs are borrowed numpy arrays, outputs are new arrays.
#[pyclass(name = "SignalProcessor")]
pub struct PySignalProcessor {
    config: AnalysisConfig,
    duration: DurationDetector,
    smoother: BandpassSmoother,
    peaks: PeakExtractor,
    spatial: SpatialDecomposer,
}

impl PySignalProcessor {
    fn from_config(config: AnalysisConfig) -> Self {
        Self {
            duration: DurationDetector::new(config.cal_duration.clone()),
            smoother: BandpassSmoother::new(config.wavelet.clone(), config.savgol.clone()),
            peaks: PeakExtractor::new(config.peaks.clone()),
            spatial: SpatialDecomposer::new(config.spatial.clone()),
            config,
        }
    }
}

#[pymethods]
impl PySignalProcessor {
    /// Create a processor
    ///
    /// Args:
    ///     config_json: Optional JSON config, either the analysis section or
    ///         a document holding it under "analysis"
    #[new]
    #[pyo3(signature = (config_json=None))]
    fn new(config_json: Option<&str>) -> PyResult<Self> {
        let config = match config_json {
            Some(json) => AnalysisConfig::from_json_str(json).map_err(to_py_err)?,
            None => AnalysisConfig::default(),
        };
        Ok(Self::from_config(config))
    }

    /// Plasma discharge duration from the reference current
    ///
    /// Returns:
    ///     Tuple of (duration, peak_amplitude, start_index), zeros if never valid
    fn cal_duration(
        &self,
        trace: PyReadonlyArray1<f64>,
        time: PyReadonlyArray1<f64>,
    ) -> PyResult<(f64, f64, usize)> {
        let trace = trace.as_array().to_vec();
        let time = time.as_array().to_vec();
        let estimate = self.duration.detect(&trace, &time).map_err(to_py_err)?;
        Ok((estimate.duration, estimate.peak_amplitude, estimate.start_index))
    }

    /// Single-channel spectrogram
    ///
    /// Args:
    ///     window: Optional window name ("hann", "hamming", "blackman", "rectangular")
    ///
    /// Returns:
    ///     Tuple of (frequencies, times, power) with power shaped (freq, time)
    #[pyo3(signature = (data, sample_rate, nperseg=None, window_ms=None, noverlap=None, nfft=None, window=None))]
    #[allow(clippy::too_many_arguments)]
    fn compute_spectrogram<'py>(
        &self,
        py: Python<'py>,
        data: PyReadonlyArray1<f64>,
        sample_rate: f64,
        nperseg: Option<usize>,
        window_ms: Option<f64>,
        noverlap: Option<usize>,
        nfft: Option<usize>,
        window: Option<&str>,
    ) -> PyResult<(Array1Py<'py>, Array1Py<'py>, Array2Py<'py>)> {
        let mut config: SpectrogramConfig = self.config.spectrogram.clone();
        if let Some(name) = window {
            config.window = name.parse::<WindowType>().map_err(to_py_err)?;
        }
        let params = SpectrogramParams {
            nperseg,
            window_ms,
            noverlap,
            nfft,
        };

        let samples = data.as_array().to_vec();
        let spec = SpectralEstimator::new(config)
            .compute(&samples, sample_rate, &params)
            .map_err(to_py_err)?;

        Ok((
            spec.frequencies.into_pyarray(py),
            spec.times.into_pyarray(py),
            spec.power.into_pyarray(py),
        ))
    }

    /// Clip, bandpass and smooth a time window of every channel
    ///
    /// Args:
    ///     data: (channels, time) matrix
    ///
    /// Returns:
    ///     Tuple of (time, data) with data shaped (time, channel), or None for
    ///     an empty window
    #[allow(clippy::too_many_arguments)]
    fn compute_wavelet_data<'py>(
        &self,
        py: Python<'py>,
        data: PyReadonlyArray2<f64>,
        time: PyReadonlyArray1<f64>,
        t_start: f64,
        t_end: f64,
        center_hz: f64,
        half_width_hz: f64,
        sample_rate: f64,
    ) -> PyResult<Option<(Array1Py<'py>, Array2Py<'py>)>> {
        let result = self.smoother.apply_raw(
            data.as_array(),
            time.as_array(),
            t_start,
            t_end,
            center_hz,
            half_width_hz,
            sample_rate,
        );

        Ok(degenerate_to_none(result)?
            .map(|window| (window.time.into_pyarray(py), window.data.into_pyarray(py))))
    }

    /// Local maxima of every channel of a (channels, time) matrix
    ///
    /// Returns:
    ///     List of (time, channel, value) tuples, channels 1-based
    #[pyo3(signature = (time, data, distance=None))]
    fn find_all_peaks(
        &self,
        time: PyReadonlyArray1<f64>,
        data: PyReadonlyArray2<f64>,
        distance: Option<usize>,
    ) -> PyResult<Vec<(f64, usize, f64)>> {
        let peaks = self
            .peaks
            .extract(time.as_array(), data.as_array(), distance)
            .map_err(to_py_err)?;
        Ok(peaks.iter().map(|p| (p.time, p.channel, p.amplitude)).collect())
    }

    /// Non-negative local maxima of a (time, channel) window
    ///
    /// Returns:
    ///     Tuple of (times, channels, amplitudes)
    fn find_wavelet_peaks<'py>(
        &self,
        py: Python<'py>,
        time: PyReadonlyArray1<f64>,
        data: PyReadonlyArray2<f64>,
    ) -> PyResult<(Array1Py<'py>, &'py PyArray1<usize>, Array1Py<'py>)> {
        let columns = self
            .peaks
            .positive_peaks(time.as_array(), data.as_array())
            .map_err(to_py_err)?;
        Ok((
            PyArray1::from_vec(py, columns.times),
            PyArray1::from_vec(py, columns.channels),
            PyArray1::from_vec(py, columns.amplitudes),
        ))
    }

    /// Signed phase differences from per-channel maxima
    ///
    /// Args:
    ///     mode: "m" (poloidal) or "n" (toroidal)
    ///
    /// Returns:
    ///     Tuple of (angles, phase_diffs) in degrees, or None for an empty window
    #[pyo3(signature = (data, time, t1, t2, fbase, mode="m", reference_channel=0))]
    #[allow(clippy::too_many_arguments)]
    fn calculate_phase_diffs<'py>(
        &self,
        py: Python<'py>,
        data: PyReadonlyArray2<f64>,
        time: PyReadonlyArray1<f64>,
        t1: f64,
        t2: f64,
        fbase: f64,
        mode: &str,
        reference_channel: usize,
    ) -> PyResult<Option<(Array1Py<'py>, Array1Py<'py>)>> {
        let layout = ProbeLayout::from_mode(mode).map_err(to_py_err)?;
        let result = PhaseAnalyzer::direct(
            data.as_array(),
            time.as_array(),
            t1,
            t2,
            fbase,
            layout,
            reference_channel,
        );

        Ok(degenerate_to_none(result)?.map(|fit| {
            (
                PyArray1::from_vec(py, fit.angles),
                PyArray1::from_vec(py, fit.phase_diffs),
            )
        }))
    }

    /// Unsigned phase differences from peaks snapped to a two-point line
    ///
    /// Args:
    ///     peaks: List of (time_ms, channel, value) tuples
    ///     p1, p2: Selected (time_ms, channel) points
    ///     fbase: Mode frequency in Hz
    ///
    /// Returns:
    ///     Tuple of (angles, phase_diffs, times) or None when the line is degenerate
    #[pyo3(signature = (peaks, p1, p2, fbase, num_coils=12, excluded_channels=None))]
    #[allow(clippy::too_many_arguments)]
    fn calculate_phase_diffs_robust<'py>(
        &self,
        py: Python<'py>,
        peaks: Vec<(f64, usize, f64)>,
        p1: (f64, f64),
        p2: (f64, f64),
        fbase: f64,
        num_coils: usize,
        excluded_channels: Option<Vec<usize>>,
    ) -> PyResult<Option<(Array1Py<'py>, Array1Py<'py>, Array1Py<'py>)>> {
        let records: Vec<PeakRecord> = peaks
            .into_iter()
            .map(|(time, channel, amplitude)| PeakRecord {
                time,
                channel,
                amplitude,
            })
            .collect();
        let excluded = excluded_channels.unwrap_or_default();

        let result = PhaseAnalyzer::robust(
            &records,
            ReferencePoint::new(p1.0, p1.1),
            ReferencePoint::new(p2.0, p2.1),
            fbase,
            num_coils,
            &excluded,
        );

        Ok(degenerate_to_none(result)?.map(|fit| {
            (
                PyArray1::from_vec(py, fit.angles),
                PyArray1::from_vec(py, fit.phase_diffs),
                PyArray1::from_vec(py, fit.reference_times),
            )
        }))
    }

    /// Economy SVD of a (channels, time) matrix
    ///
    /// Returns:
    ///     Tuple of (U, S, VT), or None if the decomposition fails
    fn compute_svd<'py>(
        &self,
        py: Python<'py>,
        data: PyReadonlyArray2<f64>,
    ) -> PyResult<Option<(Array2Py<'py>, Array1Py<'py>, Array2Py<'py>)>> {
        match self.spatial.decompose(data.as_array()) {
            Ok(svd) => Ok(Some((
                svd.u.into_pyarray(py),
                svd.s.into_pyarray(py),
                svd.vt.into_pyarray(py),
            ))),
            Err(AnalysisError::Decomposition(_)) => Ok(None),
            Err(error) => Err(to_py_err(error)),
        }
    }

    /// Probe ring deformed by one spatial mode
    ///
    /// Returns:
    ///     Dict with 'x_smooth', 'y_smooth', 'x_disp', 'y_disp', 'x_orig', 'y_orig',
    ///     or None if the curve cannot be interpolated
    #[pyo3(signature = (spatial_mode, num_coils=12))]
    fn compute_spatial_structure<'py>(
        &self,
        py: Python<'py>,
        spatial_mode: PyReadonlyArray1<f64>,
        num_coils: usize,
    ) -> PyResult<Option<&'py PyDict>> {
        let structure = match self.spatial.reconstruct(spatial_mode.as_array(), num_coils) {
            Ok(structure) => structure,
            Err(AnalysisError::SplineFit(_)) => return Ok(None),
            Err(error) => return Err(to_py_err(error)),
        };

        let dict = PyDict::new(py);
        for (prefix, points) in [
            ("smooth", &structure.smoothed_curve),
            ("disp", &structure.displaced_positions),
            ("orig", &structure.probe_positions),
        ] {
            let xy = points_to_array(points);
            dict.set_item(format!("x_{}", prefix), xy.column(0).to_owned().into_pyarray(py))?;
            dict.set_item(format!("y_{}", prefix), xy.column(1).to_owned().into_pyarray(py))?;
        }
        Ok(Some(dict))
    }

    /// Least squares line through (angle, phase) pairs
    ///
    /// Returns:
    ///     Tuple of (slope, intercept, r_squared)
    fn linear_fit(
        &self,
        x: PyReadonlyArray1<f64>,
        y: PyReadonlyArray1<f64>,
    ) -> PyResult<(f64, f64, f64)> {
        let x = x.as_array().to_vec();
        let y = y.as_array().to_vec();
        let fit = LinearFit::fit(&x, &y).map_err(to_py_err)?;
        Ok((fit.slope, fit.intercept, fit.r_squared))
    }
}
