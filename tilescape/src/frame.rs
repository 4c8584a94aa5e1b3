//! Per-frame context handed into the scheduler by the host frame loop.
//!
//! The scheduler is driven once per rendered frame with a [`FrameContext`]
//! describing the camera and viewport. All values are read-only inputs; the
//! scheduler never mutates the context.

/// Fog parameters contributing an attenuation term to screen-space error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogSettings {
    /// Fog density factor.
    pub density: f64,
    /// Screen-space-error contribution factor.
    pub sse_factor: f64,
}

impl FogSettings {
    /// Attenuation for an object at `distance`, in `[0, 1)`.
    ///
    /// Grows towards 1 as the object recedes into fog, allowing distant
    /// tiles to tolerate more geometric error.
    pub fn attenuation(&self, distance: f64) -> f64 {
        let scalar = distance * self.density;
        1.0 - (-(scalar * scalar)).exp()
    }
}

/// Read-only description of one frame: camera, viewport, LOD controls.
#[derive(Debug, Clone)]
pub struct FrameContext {
    /// Monotonically increasing frame counter.
    pub frame_number: u64,
    /// Drawing-buffer height in physical pixels.
    pub viewport_height: f64,
    /// Frustum-derived denominator for the SSE metric
    /// (`2 * tan(fov_y / 2)` for a perspective frustum).
    pub sse_denominator: f64,
    /// Device pixel ratio.
    pub pixel_ratio: f64,
    /// Threshold above which a tile is refined instead of accepted.
    pub maximum_screen_space_error: f64,
    /// Optional fog attenuation of the error metric.
    pub fog: Option<FogSettings>,
    /// Camera position in the scene's world coordinates; consumed only by
    /// the visibility oracle.
    pub camera_position: [f64; 3],
    /// Freeze LOD selection and reuse the previous frame's tile set.
    pub suspend_lod: bool,
}

impl FrameContext {
    /// Create a context with common defaults for the given frame number.
    pub fn new(frame_number: u64) -> Self {
        Self {
            frame_number,
            viewport_height: 1080.0,
            sse_denominator: 1.0,
            pixel_ratio: 1.0,
            maximum_screen_space_error: 16.0,
            fog: None,
            camera_position: [0.0, 0.0, 0.0],
            suspend_lod: false,
        }
    }

    /// Set the camera position.
    pub fn with_camera(mut self, position: [f64; 3]) -> Self {
        self.camera_position = position;
        self
    }

    /// Set the maximum screen-space error.
    pub fn with_max_sse(mut self, sse: f64) -> Self {
        self.maximum_screen_space_error = sse;
        self
    }

    /// Enable suspend mode.
    pub fn suspended(mut self) -> Self {
        self.suspend_lod = true;
        self
    }
}
