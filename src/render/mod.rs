pub mod compositor;
pub mod draw;
pub mod garment;
pub mod skeleton;
#[cfg(feature = "desktop")]
pub mod window;

pub use compositor::{CompositeFrame, LayerCompositor, Layers};
pub use garment::GarmentSprite;
pub use skeleton::SKELETON_CONNECTIONS;
#[cfg(feature = "desktop")]
pub use window::{MinifbRenderer, PreviewWindow};

/// 合成済みフレームの出力先
pub trait Presenter {
    /// `false` を返すと出力先が閉じられたものとしてフレームループを止める
    fn present(&mut self, frame: &CompositeFrame) -> bool;
}

impl<P: Presenter + ?Sized> Presenter for Box<P> {
    fn present(&mut self, frame: &CompositeFrame) -> bool {
        (**self).present(frame)
    }
}

/// 何も表示しない
pub struct NoPreview;

impl Presenter for NoPreview {
    fn present(&mut self, _frame: &CompositeFrame) -> bool {
        true
    }
}
