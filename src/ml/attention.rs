use burn::{
    nn::{Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};

use crate::domain::error::AttentionError;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct MultiHeadedAttentionConfig {
    pub d_model: usize,
    pub heads:   usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl MultiHeadedAttentionConfig {
    /// Fails with `InvalidHeadCount` unless `d_model` splits evenly into `heads`.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<MultiHeadedAttention<B>, AttentionError> {
        if self.heads == 0 || self.d_model % self.heads != 0 {
            return Err(AttentionError::InvalidHeadCount {
                d_model: self.d_model,
                heads:   self.heads,
            });
        }
        let d_k = self.d_model / self.heads;
        let projection = || {
            LinearConfig::new(self.d_model, self.heads * d_k)
                .with_bias(false)
                .init(device)
        };

        Ok(MultiHeadedAttention {
            linear_keys:   projection(),
            linear_values: projection(),
            linear_query:  projection(),
            layer_norm:    LayerNormConfig::new(self.d_model).init(device),
            dropout:       DropoutConfig::new(self.dropout).init(),
            res_dropout:   DropoutConfig::new(self.dropout).init(),
            heads:         self.heads,
            d_k,
            d_model:       self.d_model,
        })
    }
}

#[derive(Module, Debug)]
pub struct MultiHeadedAttention<B: Backend> {
    pub linear_keys:   Linear<B>,
    pub linear_values: Linear<B>,
    pub linear_query:  Linear<B>,
    pub layer_norm:    LayerNorm<B>,
    /// Applied to the attention weights
    pub dropout:       Dropout,
    /// Applied to the context before the residual add
    pub res_dropout:   Dropout,
    pub heads:         usize,
    pub d_k:           usize,
    pub d_model:       usize,
}

pub struct AttentionOutput<B: Backend> {
    /// [batch, q_len, d_model], normalised
    pub context:   Tensor<B, 3>,
    /// [batch, heads, q_len, k_len], softmax weights before dropout
    pub attention: Tensor<B, 4>,
}

impl<B: Backend> MultiHeadedAttention<B> {
    /// key, value: [batch, k_len, d_model], query: [batch, q_len, d_model],
    /// mask: [batch, q_len, k_len] with `true` at positions to suppress.
    ///
    /// A query row whose keys are all masked has no defined distribution
    /// and comes out as NaN.
    pub fn forward(
        &self,
        key:   Tensor<B, 3>,
        value: Tensor<B, 3>,
        query: Tensor<B, 3>,
        mask:  Option<Tensor<B, 3, Bool>>,
    ) -> Result<AttentionOutput<B>, AttentionError> {
        let [batch, k_len, _] = key.dims();
        let [_, q_len, _]     = query.dims();
        check_shape("key", &key.dims(), &[batch, k_len, self.d_model])?;
        check_shape("value", &value.dims(), &[batch, k_len, self.d_model])?;
        check_shape("query", &query.dims(), &[batch, q_len, self.d_model])?;
        if let Some(mask) = &mask {
            check_shape("mask", &mask.dims(), &[batch, q_len, k_len])?;
        }

        let residual = query.clone();
        let key_up   = self.shape_projection(self.linear_keys.forward(key));
        let value_up = self.shape_projection(self.linear_values.forward(value));
        let query_up = self.shape_projection(self.linear_query.forward(query));

        // [batch·heads, q_len, k_len]
        let scores = query_up.matmul(key_up.swap_dims(1, 2)) / (self.d_k as f64).sqrt();
        let scores = match mask {
            Some(mask) => {
                let mask = mask
                    .unsqueeze_dim::<4>(1)
                    .expand([batch, self.heads, q_len, k_len])
                    .reshape([batch * self.heads, q_len, k_len]);
                scores.mask_fill(mask, f32::NEG_INFINITY)
            }
            None => scores,
        };

        let weights = softmax(scores, 2);
        let attention = weights.clone().reshape([batch, self.heads, q_len, k_len]);

        let context = self.dropout.forward(weights).matmul(value_up);
        let context = self.unshape_projection(context, batch, q_len);

        let context = self.layer_norm.forward(self.res_dropout.forward(context) + residual);
        Ok(AttentionOutput { context, attention })
    }

    /// [batch, len, heads·d_k] → [batch·heads, len, d_k]
    fn shape_projection(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, len, _] = x.dims();
        x.reshape([batch, len, self.heads, self.d_k])
            .swap_dims(1, 2)
            .reshape([batch * self.heads, len, self.d_k])
    }

    /// [batch·heads, len, d_k] → [batch, len, heads·d_k]
    fn unshape_projection(&self, x: Tensor<B, 3>, batch: usize, len: usize) -> Tensor<B, 3> {
        x.reshape([batch, self.heads, len, self.d_k])
            .swap_dims(1, 2)
            .reshape([batch, len, self.heads * self.d_k])
    }
}

/// Expand a batcher padding mask [batch, k_len] (true = PAD) to the
/// [batch, q_len, k_len] mask `forward` takes.
pub fn key_padding_mask<B: Backend>(padding: Tensor<B, 2, Bool>, q_len: usize) -> Tensor<B, 3, Bool> {
    let [batch, k_len] = padding.dims();
    padding.unsqueeze_dim::<3>(1).expand([batch, q_len, k_len])
}

fn check_shape(what: &'static str, found: &[usize], expected: &[usize]) -> Result<(), AttentionError> {
    if found == expected {
        Ok(())
    } else {
        Err(AttentionError::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            found:    found.to_vec(),
        })
    }
}
