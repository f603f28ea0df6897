/// Per-unit rates in USD, loaded from the environment with defaults.
#[derive(Clone, Debug)]
pub struct CostConfig {
    pub cpu_cost_per_second: f64,
    pub storage_cost_per_mb: f64,
    pub gpu_cost_per_second: f64,
    pub bandwidth_cost_per_mb: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            cpu_cost_per_second: 0.0005,
            storage_cost_per_mb: 0.00002,
            gpu_cost_per_second: 0.002,
            bandwidth_cost_per_mb: 0.00001,
        }
    }
}

fn env_rate(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(default)
}

impl CostConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let config = Self {
            cpu_cost_per_second: env_rate(
                "REELFORGE_CPU_COST_PER_SECOND",
                defaults.cpu_cost_per_second,
            ),
            storage_cost_per_mb: env_rate(
                "REELFORGE_STORAGE_COST_PER_MB",
                defaults.storage_cost_per_mb,
            ),
            gpu_cost_per_second: env_rate(
                "REELFORGE_GPU_COST_PER_SECOND",
                defaults.gpu_cost_per_second,
            ),
            bandwidth_cost_per_mb: env_rate(
                "REELFORGE_BANDWIDTH_COST_PER_MB",
                defaults.bandwidth_cost_per_mb,
            ),
        };
        tracing::debug!(
            cpu = config.cpu_cost_per_second,
            storage = config.storage_cost_per_mb,
            "cost config loaded"
        );
        config
    }
}

/// Resource usage for one render job.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct UsageMetrics {
    pub render_time_seconds: f64,
    pub video_duration_seconds: f64,
    pub scenes_count: usize,
    pub resolution: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_size_mb: Option<f64>,
    pub total_frames: u64,
}

impl UsageMetrics {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        render_time_seconds: f64,
        video_duration_seconds: f64,
        scenes_count: usize,
        width: u32,
        height: u32,
        fps: u32,
        output_size_mb: Option<f64>,
    ) -> Self {
        Self {
            render_time_seconds,
            video_duration_seconds,
            scenes_count,
            resolution: format!("{width}x{height}"),
            width,
            height,
            fps,
            output_size_mb,
            total_frames: (video_duration_seconds * f64::from(fps)).max(0.0) as u64,
        }
    }
}

/// Cost breakdown in USD. All monetary fields are rounded to 6 decimals
/// (8 for the per-frame rate).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CostBreakdown {
    pub cpu_cost_usd: f64,
    pub storage_cost_usd: f64,
    pub gpu_cost_usd: f64,
    pub bandwidth_cost_usd: f64,
    pub total_cost_usd: f64,
    pub cost_per_second_video: f64,
    pub cost_per_frame: f64,
    pub currency: String,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

impl CostBreakdown {
    fn build(
        cpu_cost_usd: f64,
        storage_cost_usd: f64,
        gpu_cost_usd: f64,
        bandwidth_cost_usd: f64,
        video_duration_seconds: f64,
        total_frames: u64,
    ) -> Self {
        let total = cpu_cost_usd + storage_cost_usd + gpu_cost_usd + bandwidth_cost_usd;

        let cost_per_second = if video_duration_seconds > 0.0 {
            total / video_duration_seconds
        } else {
            0.0
        };
        let cost_per_frame = if total_frames > 0 {
            total / total_frames as f64
        } else {
            0.0
        };

        Self {
            cpu_cost_usd: round_to(cpu_cost_usd, 6),
            storage_cost_usd: round_to(storage_cost_usd, 6),
            gpu_cost_usd: round_to(gpu_cost_usd, 6),
            bandwidth_cost_usd: round_to(bandwidth_cost_usd, 6),
            total_cost_usd: round_to(total, 6),
            cost_per_second_video: round_to(cost_per_second, 6),
            cost_per_frame: round_to(cost_per_frame, 8),
            currency: "USD".to_string(),
        }
    }
}

/// Stateless calculator turning usage metrics into a cost breakdown; also
/// provides the pre-flight estimate used for quotes.
#[derive(Clone, Debug, Default)]
pub struct CostCalculator {
    config: CostConfig,
}

/// Empirical multiplier between output seconds and render seconds at the
/// baseline resolution/fps.
const ESTIMATE_RENDER_TIME_FACTOR: f64 = 2.0;
const BASE_PIXELS: f64 = 1080.0 * 1920.0;
const BASE_FPS: f64 = 30.0;

impl CostCalculator {
    pub fn new(config: CostConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(CostConfig::from_env())
    }

    pub fn calculate(
        &self,
        usage: &UsageMetrics,
        include_gpu: bool,
        include_bandwidth: bool,
    ) -> CostBreakdown {
        let cpu = usage.render_time_seconds * self.config.cpu_cost_per_second;
        let storage = usage.output_size_mb.unwrap_or(0.0) * self.config.storage_cost_per_mb;
        let gpu = if include_gpu {
            usage.render_time_seconds * self.config.gpu_cost_per_second
        } else {
            0.0
        };
        let bandwidth = if include_bandwidth {
            usage.output_size_mb.unwrap_or(0.0) * self.config.bandwidth_cost_per_mb
        } else {
            0.0
        };

        let breakdown = CostBreakdown::build(
            cpu,
            storage,
            gpu,
            bandwidth,
            usage.video_duration_seconds,
            usage.total_frames,
        );
        tracing::debug!(total = breakdown.total_cost_usd, "cost calculated");
        breakdown
    }

    /// Cost for a failed render: only wall-clock time (and output size when
    /// one exists) is known.
    pub fn calculate_partial(
        &self,
        render_time_seconds: f64,
        output_size_mb: Option<f64>,
    ) -> CostBreakdown {
        CostBreakdown::build(
            render_time_seconds * self.config.cpu_cost_per_second,
            output_size_mb.unwrap_or(0.0) * self.config.storage_cost_per_mb,
            0.0,
            0.0,
            0.0,
            0,
        )
    }

    /// Pre-flight quote: predict render time and output size from resolution,
    /// fps and a complexity factor, then apply the normal cost formula.
    pub fn estimate(
        &self,
        video_duration_seconds: f64,
        width: u32,
        height: u32,
        fps: u32,
        complexity_factor: f64,
    ) -> CostBreakdown {
        let pixel_factor = f64::from(width) * f64::from(height) / BASE_PIXELS;
        let fps_factor = f64::from(fps) / BASE_FPS;

        let estimated_render_time = video_duration_seconds
            * pixel_factor
            * fps_factor
            * complexity_factor
            * ESTIMATE_RENDER_TIME_FACTOR;

        // ~1 MB per output second at the baseline (8 Mbit/s), scaled like the
        // render time.
        let estimated_size_mb = video_duration_seconds * pixel_factor * fps_factor;

        CostBreakdown::build(
            estimated_render_time * self.config.cpu_cost_per_second,
            estimated_size_mb * self.config.storage_cost_per_mb,
            0.0,
            0.0,
            video_duration_seconds,
            (video_duration_seconds * f64::from(fps)).max(0.0) as u64,
        )
    }
}
