// SPDX-License-Identifier: PolyForm-Shield-1.0

use ndarray::{Array4, Axis};

pub const INPUT_CHANNELS: usize = 3;
pub const INPUT_HEIGHT: usize = 224;
pub const INPUT_WIDTH: usize = 224;
/// NCHW with a batch of one.
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_CHANNELS, INPUT_HEIGHT, INPUT_WIDTH];

/// normalized image batch in channel-first layout, always `1×3×224×224`.
///
/// the array is kept in standard (row-major, contiguous) layout so engines
/// can copy it out as one flat slice.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Array4<f32>,
}

impl InputTensor {
    /// build the tensor element by element from `(channel, y, x)`.
    pub fn from_fn<F>(mut f: F) -> Self
    where
        F: FnMut(usize, usize, usize) -> f32,
    {
        let data = Array4::from_shape_fn(INPUT_SHAPE, |(_, c, y, x)| f(c, y, x));
        Self { data }
    }

    pub fn zeros() -> Self {
        Self {
            data: Array4::zeros(INPUT_SHAPE),
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn array(&self) -> &Array4<f32> {
        &self.data
    }

    /// contiguous NCHW values.
    pub fn as_slice(&self) -> &[f32] {
        // only ever constructed through from_shape_fn / zeros, both of which
        // produce standard layout.
        self.data
            .as_slice()
            .unwrap_or_else(|| unreachable!("input tensor lost standard layout"))
    }

    /// mean over one channel plane.
    pub fn channel_mean(&self, channel: usize) -> f32 {
        let plane = self.data.index_axis(Axis(1), channel);
        plane.sum() / plane.len() as f32
    }
}

/// first declared output of a forward pass, flattened, with its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
    shape: Vec<usize>,
    values: Vec<f32>,
}

impl RawOutput {
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Self {
        Self { shape, values }
    }

    /// convenience for a single `[1, n]` logits row.
    pub fn from_logits(logits: Vec<f32>) -> Self {
        Self {
            shape: vec![1, logits.len()],
            values: logits,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// logits of the first batch item. for rank ≤ 1 outputs that is the
    /// whole buffer.
    pub fn first_row(&self) -> &[f32] {
        let row_len = if self.shape.len() >= 2 {
            self.shape[1..].iter().product::<usize>()
        } else {
            self.values.len()
        };
        &self.values[..row_len.min(self.values.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_fn_places_channels_first() {
        let tensor = InputTensor::from_fn(|c, _, _| c as f32);
        assert_eq!(tensor.shape(), &INPUT_SHAPE);
        assert_eq!(tensor.channel_mean(0), 0.0);
        assert_eq!(tensor.channel_mean(2), 2.0);

        let plane = INPUT_HEIGHT * INPUT_WIDTH;
        let flat = tensor.as_slice();
        assert_eq!(flat.len(), INPUT_CHANNELS * plane);
        assert_eq!(flat[plane - 1], 0.0);
        assert_eq!(flat[plane], 1.0);
        assert_eq!(flat[2 * plane], 2.0);
    }

    #[test]
    fn first_row_of_batched_output() {
        let raw = RawOutput::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(raw.first_row(), &[1.0, 2.0, 3.0]);

        let flat = RawOutput::new(vec![4], vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(flat.first_row().len(), 4);

        let logits = RawOutput::from_logits(vec![0.5; 10]);
        assert_eq!(logits.shape(), &[1, 10]);
        assert_eq!(logits.first_row().len(), 10);
    }
}
