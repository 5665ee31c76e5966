//! Layered compositing of one output frame.
//!
//! Layer order is fixed: camera, background replacement (mask present), garment
//! (transform present), debug skeleton (landmarks present). Each optional input
//! degrades by omission.

use image::imageops::{self, FilterType};
use image::{GrayImage, Rgba, RgbaImage};

use super::draw::blend;
use super::garment::GarmentSprite;
use super::skeleton::draw_skeleton;
use crate::anchor::GarmentTransform;
use crate::config::CompositorConfig;
use crate::pose::DetectionResult;

/// Which layers ended up on the surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Layers {
    pub background: bool,
    pub garment: bool,
    pub skeleton: bool,
}

/// The rendered output for one frame.
#[derive(Debug, Clone)]
pub struct CompositeFrame {
    surface: RgbaImage,
    garment: Option<GarmentTransform>,
    layers: Layers,
}

impl CompositeFrame {
    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    /// Transform the garment was drawn with, if it was drawn.
    pub fn garment(&self) -> Option<&GarmentTransform> {
        self.garment.as_ref()
    }

    pub fn layers(&self) -> Layers {
        self.layers
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.surface.dimensions()
    }
}

pub struct LayerCompositor {
    garment: Option<GarmentSprite>,
    background: Rgba<u8>,
    skeleton: bool,
    skeleton_threshold: f32,
    keypoint_radius: i32,
}

impl LayerCompositor {
    pub fn new(config: &CompositorConfig, garment: Option<GarmentSprite>) -> Self {
        let [r, g, b] = config.background;
        Self {
            garment,
            background: Rgba([r, g, b, 255]),
            skeleton: config.skeleton,
            skeleton_threshold: config.skeleton_threshold,
            keypoint_radius: config.keypoint_radius,
        }
    }

    pub fn has_garment(&self) -> bool {
        self.garment.is_some()
    }

    pub fn compose(&self, detection: &DetectionResult, transform: Option<&GarmentTransform>) -> CompositeFrame {
        let mut layers = Layers::default();

        let mut surface = draw_camera(detection.frame());

        if let Some(mask) = detection.mask() {
            replace_background(&mut surface, mask, self.background);
            layers.background = true;
        }

        let mut drawn = None;
        if let (Some(sprite), Some(transform)) = (&self.garment, transform) {
            sprite.draw(&mut surface, transform);
            drawn = Some(*transform);
            layers.garment = true;
        }

        if self.skeleton && !detection.landmarks().is_empty() {
            draw_skeleton(
                &mut surface,
                detection.landmarks(),
                self.skeleton_threshold,
                self.keypoint_radius,
            );
            layers.skeleton = true;
        }

        CompositeFrame {
            surface,
            garment: drawn,
            layers,
        }
    }
}

/// Fresh opaque surface of the frame's size holding the camera image.
fn draw_camera(frame: &RgbaImage) -> RgbaImage {
    let mut surface = frame.clone();
    for pixel in surface.pixels_mut() {
        pixel[3] = 255;
    }
    surface
}

/// `out = cam * m + background * (1 - m)`, `m = mask / 255`.
fn replace_background(surface: &mut RgbaImage, mask: &GrayImage, background: Rgba<u8>) {
    let resized;
    let mask = if mask.dimensions() == surface.dimensions() {
        mask
    } else {
        resized = imageops::resize(mask, surface.width(), surface.height(), FilterType::Nearest);
        &resized
    };

    for (pixel, m) in surface.pixels_mut().zip(mask.pixels()) {
        *pixel = blend(background, *pixel, m[0]);
    }
}
