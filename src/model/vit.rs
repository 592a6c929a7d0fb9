//! Vision Transformer for binary chest X-ray classification
//!
//! The image is split into fixed-size patches by a strided convolution, a
//! learned class token is prepended, learned positional embeddings are added,
//! and the token sequence runs through a stack of self-attention encoder
//! blocks. The class token state feeds a single-output head whose sigmoid is
//! the predicted pneumonia probability.

use burn::{
    config::Config,
    module::{Module, Param},
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        conv::{Conv2d, Conv2dConfig},
        Dropout, DropoutConfig, Embedding, EmbeddingConfig, Initializer, LayerNorm,
        LayerNormConfig, Linear, LinearConfig,
    },
    tensor::{activation::gelu, activation::sigmoid, backend::Backend, Int, Tensor},
};

/// The capability the training and evaluation loops depend on: a
/// differentiable map from an image batch to one probability per image.
pub trait BinaryClassifier<B: Backend> {
    /// Forward pass: `[batch, 3, H, W]` images to `[batch]` probabilities
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 1>;
}

/// Configuration for the Vision Transformer
#[derive(Config, Debug)]
pub struct ViTConfig {
    /// Input image side length (assumes square images)
    #[config(default = "224")]
    pub image_size: usize,

    /// Side length of one square patch
    #[config(default = "16")]
    pub patch_size: usize,

    /// Embedding dimension
    #[config(default = "256")]
    pub d_model: usize,

    /// Number of attention heads
    #[config(default = "8")]
    pub n_heads: usize,

    /// Number of encoder blocks
    #[config(default = "8")]
    pub n_layers: usize,

    /// Hidden dimension of the per-block MLP
    #[config(default = "768")]
    pub d_mlp: usize,

    /// Dropout rate applied to embeddings and inside blocks
    #[config(default = "0.1")]
    pub dropout: f64,
}

impl ViTConfig {
    /// Initialize the model on the given device
    pub fn init<B: Backend>(&self, device: &B::Device) -> VisionTransformer<B> {
        assert!(
            self.image_size % self.patch_size == 0,
            "image size {} is not divisible by patch size {}",
            self.image_size,
            self.patch_size
        );
        let per_side = self.image_size / self.patch_size;
        let num_patches = per_side * per_side;

        let patch_embed = PatchEmbedding::new(self.patch_size, self.d_model, device);
        let class_token = Initializer::Normal {
            mean: 0.0,
            std: 0.02,
        }
        .init([1, 1, self.d_model], device);
        let position_embedding = EmbeddingConfig::new(num_patches + 1, self.d_model).init(device);
        let embed_dropout = DropoutConfig::new(self.dropout).init();

        let blocks = (0..self.n_layers)
            .map(|_| EncoderBlock::new(self.d_model, self.n_heads, self.d_mlp, self.dropout, device))
            .collect();

        let norm = LayerNormConfig::new(self.d_model).init(device);
        let head = LinearConfig::new(self.d_model, 1).init(device);

        VisionTransformer {
            patch_embed,
            class_token,
            position_embedding,
            embed_dropout,
            blocks,
            norm,
            head,
            num_patches,
        }
    }
}

/// Strided convolution mapping an image to a sequence of patch embeddings
#[derive(Module, Debug)]
pub struct PatchEmbedding<B: Backend> {
    proj: Conv2d<B>,
}

impl<B: Backend> PatchEmbedding<B> {
    fn new(patch_size: usize, d_model: usize, device: &B::Device) -> Self {
        let proj = Conv2dConfig::new([3, d_model], [patch_size, patch_size])
            .with_stride([patch_size, patch_size])
            .init(device);
        Self { proj }
    }

    /// `[batch, 3, H, W]` to `[batch, num_patches, d_model]`
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 3> {
        let embedded = self.proj.forward(images);
        let [batch, d_model, grid_h, grid_w] = embedded.dims();
        embedded
            .reshape([batch, d_model, grid_h * grid_w])
            .swap_dims(1, 2)
    }
}

/// One transformer encoder block: self-attention and a GELU MLP, each with a
/// residual connection and post-norm
#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    attn: MultiHeadAttention<B>,
    norm_attn: LayerNorm<B>,
    mlp_fc1: Linear<B>,
    mlp_fc2: Linear<B>,
    norm_mlp: LayerNorm<B>,
    dropout: Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    fn new(d_model: usize, n_heads: usize, d_mlp: usize, dropout: f64, device: &B::Device) -> Self {
        Self {
            attn: MultiHeadAttentionConfig::new(d_model, n_heads)
                .with_dropout(dropout)
                .init(device),
            norm_attn: LayerNormConfig::new(d_model).init(device),
            mlp_fc1: LinearConfig::new(d_model, d_mlp).init(device),
            mlp_fc2: LinearConfig::new(d_mlp, d_model).init(device),
            norm_mlp: LayerNormConfig::new(d_model).init(device),
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let attn_out = self.attn.forward(MhaInput::self_attn(x.clone())).context;
        let x = self.norm_attn.forward(x + self.dropout.forward(attn_out));

        let mlp_out = self.mlp_fc2.forward(gelu(self.mlp_fc1.forward(x.clone())));
        self.norm_mlp.forward(x + self.dropout.forward(mlp_out))
    }
}

/// Vision Transformer with a single-probability output head
#[derive(Module, Debug)]
pub struct VisionTransformer<B: Backend> {
    patch_embed: PatchEmbedding<B>,
    class_token: Param<Tensor<B, 3>>,
    position_embedding: Embedding<B>,
    embed_dropout: Dropout,
    blocks: Vec<EncoderBlock<B>>,
    norm: LayerNorm<B>,
    head: Linear<B>,
    num_patches: usize,
}

impl<B: Backend> VisionTransformer<B> {
    /// Forward pass producing one probability in `[0, 1]` per image
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 1> {
        let [batch, _, _, _] = images.dims();
        let device = images.device();

        let patches = self.patch_embed.forward(images);
        let class_token = self.class_token.val().repeat_dim(0, batch);
        let tokens = Tensor::cat(vec![class_token, patches], 1);

        let num_tokens = self.num_patches + 1;
        let positions = Tensor::<B, 1, Int>::arange(0..num_tokens as i64, &device)
            .reshape([1, num_tokens])
            .repeat_dim(0, batch);
        let mut x = tokens + self.position_embedding.forward(positions);
        x = self.embed_dropout.forward(x);

        for block in &self.blocks {
            x = block.forward(x);
        }
        let x = self.norm.forward(x);

        let [batch, _, d_model] = x.dims();
        let class_state = x.slice([0..batch, 0..1]).reshape([batch, d_model]);
        let logit = self.head.forward(class_state);

        sigmoid(logit).squeeze::<1>(1)
    }
}

impl<B: Backend> BinaryClassifier<B> for VisionTransformer<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 1> {
        VisionTransformer::forward(self, images)
    }
}
