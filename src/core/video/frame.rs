use image::{imageops, GrayImage, Luma, RgbaImage};

/// 解码后的单帧（不可变，RGBA）
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbaImage,
    /// 在原始视频/图片序列中的帧号
    pub frame_number: u64,
}

impl Frame {
    /// 数据长度与宽高不符时返回 None
    pub fn new(width: u32, height: u32, data: Vec<u8>, frame_number: u64) -> Option<Self> {
        RgbaImage::from_raw(width, height, data).map(|image| Self {
            image,
            frame_number,
        })
    }

    pub fn from_image(image: RgbaImage, frame_number: u64) -> Self {
        Self {
            image,
            frame_number,
        }
    }

    /// 从灰度数据构造（测试和 Y 平面输入使用）
    pub fn from_gray(width: u32, height: u32, gray: &[u8], frame_number: u64) -> Option<Self> {
        if gray.len() != (width as usize) * (height as usize) {
            return None;
        }
        let data: Vec<u8> = gray.iter().flat_map(|&v| [v, v, v, 255]).collect();
        Self::new(width, height, data, frame_number)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel_count(&self) -> usize {
        (self.width() as usize) * (self.height() as usize)
    }

    pub fn rgba(&self) -> &RgbaImage {
        &self.image
    }

    /// BT.601 整数亮度
    pub fn to_gray(&self) -> GrayImage {
        let mut gray = GrayImage::new(self.width(), self.height());
        for (dst, src) in gray.pixels_mut().zip(self.image.pixels()) {
            let [r, g, b, _] = src.0;
            let luma = (r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000;
            *dst = Luma([luma as u8]);
        }
        gray
    }

    pub fn resize_to(&self, target_width: u32, target_height: u32) -> Frame {
        let resized = imageops::resize(
            &self.image,
            target_width.max(1),
            target_height.max(1),
            imageops::FilterType::Triangle,
        );

        Frame {
            image: resized,
            frame_number: self.frame_number,
        }
    }

    /// 长边超过 max_edge 时等比缩小，否则原样返回
    pub fn fit_within(self, max_edge: u32) -> Frame {
        let (w, h) = (self.width(), self.height());
        let longest = w.max(h);
        if max_edge == 0 || longest <= max_edge {
            return self;
        }
        let scale = max_edge as f64 / longest as f64;
        let tw = ((w as f64 * scale).round() as u32).max(1);
        let th = ((h as f64 * scale).round() as u32).max(1);
        self.resize_to(tw, th)
    }
}

/// 原生解码器传入的 YUV420 帧
#[derive(Debug)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub y_plane: Vec<u8>,
    pub u_plane: Vec<u8>,
    pub v_plane: Vec<u8>,
    pub frame_number: u64,
}

impl RawFrame {
    /// 平面尺寸不完整时返回 None
    pub fn to_frame(&self) -> Option<Frame> {
        let w = self.width as usize;
        let h = self.height as usize;
        let chroma_w = w.div_ceil(2);
        let chroma_len = chroma_w * h.div_ceil(2);
        if self.y_plane.len() < w * h
            || self.u_plane.len() < chroma_len
            || self.v_plane.len() < chroma_len
        {
            return None;
        }

        let mut rgba = Vec::with_capacity(w * h * 4);
        for y in 0..h {
            for x in 0..w {
                let uv_idx = (y / 2) * chroma_w + x / 2;
                let luma = self.y_plane[y * w + x] as f32;
                let u = self.u_plane[uv_idx] as f32 - 128.0;
                let v = self.v_plane[uv_idx] as f32 - 128.0;

                rgba.push((luma + 1.402 * v).clamp(0.0, 255.0) as u8);
                rgba.push((luma - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8);
                rgba.push((luma + 1.772 * u).clamp(0.0, 255.0) as u8);
                rgba.push(255);
            }
        }

        Frame::new(self.width, self.height, rgba, self.frame_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let data = vec![255u8; 100 * 100 * 4];
        let frame = Frame::new(100, 100, data, 30).unwrap();

        assert_eq!(frame.width(), 100);
        assert_eq!(frame.height(), 100);
        assert_eq!(frame.pixel_count(), 10000);
        assert_eq!(frame.frame_number, 30);
    }

    #[test]
    fn test_frame_rejects_short_buffer() {
        assert!(Frame::new(10, 10, vec![0u8; 10], 0).is_none());
        assert!(Frame::from_gray(10, 10, &[0u8; 99], 0).is_none());
    }

    #[test]
    fn test_gray_conversion() {
        let frame = Frame::new(2, 1, vec![255, 0, 0, 255, 255, 255, 255, 255], 0).unwrap();
        let gray = frame.to_gray();
        assert_eq!(gray.get_pixel(0, 0)[0], 76);
        assert_eq!(gray.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn test_fit_within_keeps_aspect() {
        let frame = Frame::from_gray(200, 100, &vec![128u8; 200 * 100], 0).unwrap();
        let resized = frame.clone().fit_within(50);
        assert_eq!(resized.width(), 50);
        assert_eq!(resized.height(), 25);

        let untouched = frame.fit_within(400);
        assert_eq!(untouched.width(), 200);
    }

    #[test]
    fn test_yuv_to_frame() {
        let width = 64;
        let height = 64;
        let raw = RawFrame {
            width,
            height,
            y_plane: vec![128u8; (width * height) as usize],
            u_plane: vec![128u8; (width * height / 4) as usize],
            v_plane: vec![128u8; (width * height / 4) as usize],
            frame_number: 7,
        };

        let frame = raw.to_frame().unwrap();
        assert_eq!(frame.width(), width);
        assert_eq!(frame.frame_number, 7);
        assert_eq!(frame.to_gray().get_pixel(3, 3)[0], 128);
    }

    #[test]
    fn test_yuv_incomplete_planes() {
        let raw = RawFrame {
            width: 8,
            height: 8,
            y_plane: vec![0u8; 64],
            u_plane: vec![],
            v_plane: vec![],
            frame_number: 0,
        };
        assert!(raw.to_frame().is_none());
    }
}
