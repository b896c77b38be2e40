// ============================================================
// Layer 5: Embedding Networks
// ============================================================
// Two networks share one interface, `EmbeddingNet::forward`,
// which returns (encoding, reconstruction):
//
//   Autoencoder  - stacked fully connected encoder/decoder.
//                  Layer sizes come from the dataset descriptor,
//                  e.g. [2, 50, 50, 2]:
//                    encoder: 2 → 50 → 50 → 2   (ReLU, ReLU, linear)
//                    decoder: 2 → 50 → 50 → 2   (ReLU, ReLU, linear)
//   IdentityNet  - x → (x, x); stands in for the autoencoder when
//                  only the clustering stage is being looked at.
//
// Encoder layer `l` and decoder layer `l` form a pair that is
// trained on its own during layer-wise pretraining.

use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::relu,
};

/// Anything that maps samples to (encoding, reconstruction).
pub trait EmbeddingNet<B: Backend> {
    fn forward(&self, x: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>);

    /// Encoding only.
    fn embed(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.forward(x).0
    }
}

// ─── IdentityNet ──────────────────────────────────────────────────────────────

/// Encoding and reconstruction are both the input.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityNet;

impl<B: Backend> EmbeddingNet<B> for IdentityNet {
    fn forward(&self, x: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        (x.clone(), x)
    }
}

// ─── Autoencoder ──────────────────────────────────────────────────────────────

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct AutoencoderConfig {
    /// Input size first, embedding size last
    pub layer_dims: Vec<usize>,
    /// Input dropout for the denoising pretraining stages
    #[config(default = 0.2)]
    pub dropout: f64,
}

impl AutoencoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Autoencoder<B> {
        let depth = self.layer_dims.len().saturating_sub(1);
        let encoders = (0..depth)
            .map(|l| LinearConfig::new(self.layer_dims[l], self.layer_dims[l + 1]).init(device))
            .collect();
        let decoders = (0..depth)
            .map(|l| LinearConfig::new(self.layer_dims[l + 1], self.layer_dims[l]).init(device))
            .collect();
        let dropout = DropoutConfig::new(self.dropout).init();
        Autoencoder { encoders, decoders, dropout }
    }
}

#[derive(Module, Debug)]
pub struct Autoencoder<B: Backend> {
    /// encoders[l]: layer_dims[l] → layer_dims[l + 1]
    pub encoders: Vec<Linear<B>>,
    /// decoders[l]: layer_dims[l + 1] → layer_dims[l]
    pub decoders: Vec<Linear<B>>,
    pub dropout:  Dropout,
}

impl<B: Backend> Autoencoder<B> {
    pub fn depth(&self) -> usize {
        self.encoders.len()
    }

    /// Encoder layer `l`; the last one is linear so the embedding
    /// is not confined to the positive orthant.
    pub fn encode_layer(&self, l: usize, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let h = self.encoders[l].forward(x);
        if l + 1 < self.depth() { relu(h) } else { h }
    }

    /// Decoder layer `l`; layer 0 reconstructs raw data and is linear.
    pub fn decode_layer(&self, l: usize, h: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.decoders[l].forward(h);
        if l > 0 { relu(x) } else { x }
    }

    /// Output of the first `layers` encoder layers.
    pub fn encode_prefix(&self, x: Tensor<B, 2>, layers: usize) -> Tensor<B, 2> {
        (0..layers.min(self.depth())).fold(x, |h, l| self.encode_layer(l, h))
    }

    pub fn encode(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.encode_prefix(x, self.depth())
    }

    pub fn decode(&self, y: Tensor<B, 2>) -> Tensor<B, 2> {
        (0..self.depth()).rev().fold(y, |h, l| self.decode_layer(l, h))
    }

    /// Denoising reconstruction through pair `l` only: the input is
    /// corrupted by dropout, encoded by layer `l`, decoded back.
    pub fn layer_reconstruct(&self, l: usize, h: Tensor<B, 2>) -> Tensor<B, 2> {
        let noisy = self.dropout.forward(h);
        self.decode_layer(l, self.encode_layer(l, noisy))
    }

    /// Full reconstruction with input dropout, for fine-tuning.
    pub fn denoise(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.decode(self.encode(self.dropout.forward(x)))
    }
}

impl<B: Backend> EmbeddingNet<B> for Autoencoder<B> {
    fn forward(&self, x: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let y = self.encode(x);
        let r = self.decode(y.clone());
        (y, r)
    }

    fn embed(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.encode(x)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    fn input(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 2> {
        Tensor::<TestBackend, 1>::from_floats([1.0, -2.0, 3.5, 0.0, 7.0, -1.5].as_slice(), device)
            .reshape([3, 2])
    }

    #[test]
    fn test_identity_returns_input_twice() {
        let device = Default::default();
        let x = input(&device);
        let before = x.clone().into_data().to_vec::<f32>().unwrap();
        let (enc, rec) = EmbeddingNet::<TestBackend>::forward(&IdentityNet, x.clone());
        assert_eq!(enc.into_data().to_vec::<f32>().unwrap(), before);
        assert_eq!(rec.into_data().to_vec::<f32>().unwrap(), before);
        // The caller's tensor is untouched
        assert_eq!(x.into_data().to_vec::<f32>().unwrap(), before);
    }

    #[test]
    fn test_embed_matches_forward_encoding() {
        let device = Default::default();
        let model: Autoencoder<TestBackend> = AutoencoderConfig::new(vec![2, 5, 3]).init(&device);
        let (enc, _) = model.forward(input(&device));
        let embedded = model.embed(input(&device));
        assert_eq!(
            embedded.into_data().to_vec::<f32>().unwrap(),
            enc.into_data().to_vec::<f32>().unwrap()
        );
        let identity = EmbeddingNet::<TestBackend>::embed(&IdentityNet, input(&device));
        assert_eq!(identity.dims(), [3, 2]);
    }

    #[test]
    fn test_autoencoder_shapes() {
        let device = Default::default();
        let model: Autoencoder<TestBackend> = AutoencoderConfig::new(vec![2, 8, 4, 3]).init(&device);
        assert_eq!(model.depth(), 3);
        let (y, r) = model.forward(input(&device));
        assert_eq!(y.dims(), [3, 3]);
        assert_eq!(r.dims(), [3, 2]);
        assert_eq!(model.encode_prefix(input(&device), 1).dims(), [3, 8]);
        assert_eq!(model.layer_reconstruct(1, Tensor::zeros([5, 8], &device)).dims(), [5, 8]);
    }

    #[test]
    fn test_hidden_layers_are_non_negative() {
        let device = Default::default();
        let model: Autoencoder<TestBackend> = AutoencoderConfig::new(vec![2, 16, 2]).init(&device);
        let h = model.encode_prefix(input(&device), 1);
        let values = h.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| *v >= 0.0));
    }
}
