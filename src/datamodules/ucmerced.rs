use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use dfdx::{data::*, prelude::*};
use image::{imageops::FilterType, Rgb, Rgb32FImage};
use log::info;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::datasets::{
    split::DatasetSplit,
    ucmerced::{ensure_available, NUM_CLASSES},
    DatasetError, Sample, Test, Train, UcMerced, UcMercedOptions, Val,
};

/// Images are resized to this many pixels per side before batching.
pub const IMAGE_SIZE: usize = 256;

pub type ImageTensor = Tensor<Rank3<3, IMAGE_SIZE, IMAGE_SIZE>, f32, Cpu>;
pub type LabelTensor = Tensor<Rank1<NUM_CLASSES>, f32, Cpu>;
pub type Batch = (
    Tensor<(usize, Const<3>, Const<IMAGE_SIZE>, Const<IMAGE_SIZE>), f32, Cpu>,
    Tensor<(usize, Const<NUM_CLASSES>), f32, Cpu>,
);

/// Owns the three UC Merced splits and hands them out as batches.
///
/// Call [`prepare_data`](Self::prepare_data) then [`setup`](Self::setup)
/// before asking for batches.
pub struct UcMercedDataModule {
    root: PathBuf,
    batch_size: usize,
    seed: u64,
    options: UcMercedOptions,
    dev: Cpu,
    train: Option<UcMerced<Train>>,
    val: Option<UcMerced<Val>>,
    test: Option<UcMerced<Test>>,
}

impl UcMercedDataModule {
    pub fn new<P: AsRef<Path>>(
        root: P,
        batch_size: NonZeroUsize,
        options: UcMercedOptions,
    ) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            batch_size: batch_size.get(),
            seed: 0,
            options,
            dev: Default::default(),
            train: None,
            val: None,
            test: None,
        }
    }

    /// Seed for the shuffling of training batches.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Downloads and extracts everything the three splits need.
    pub fn prepare_data(&self) -> Result<(), DatasetError> {
        for split in DatasetSplit::ALL {
            ensure_available(&self.root, split, &self.options)?;
        }
        Ok(())
    }

    pub fn setup(&mut self) -> Result<(), DatasetError> {
        self.train = Some(UcMerced::with_options(&self.root, &self.options)?);
        self.val = Some(UcMerced::with_options(&self.root, &self.options)?);
        self.test = Some(UcMerced::with_options(&self.root, &self.options)?);
        info!(
            "UC Merced ready: {} train, {} val, {} test",
            self.train.as_ref().map_or(0, UcMerced::len),
            self.val.as_ref().map_or(0, UcMerced::len),
            self.test.as_ref().map_or(0, UcMerced::len),
        );
        Ok(())
    }

    pub fn train_dataset(&self) -> Option<&UcMerced<Train>> {
        self.train.as_ref()
    }

    pub fn val_dataset(&self) -> Option<&UcMerced<Val>> {
        self.val.as_ref()
    }

    pub fn test_dataset(&self) -> Option<&UcMerced<Test>> {
        self.test.as_ref()
    }

    /// Shuffled training batches. Each call reshuffles from `seed + epoch`.
    pub fn train_batches(
        &self,
        epoch: u64,
    ) -> Result<impl Iterator<Item = Batch> + '_, DatasetError> {
        let train = self.train.as_ref().ok_or(DatasetError::NotSetUp)?;
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(epoch));
        let dev = self.dev.clone();
        let mut order: Vec<usize> = (0..train.len()).collect();
        order.shuffle(&mut rng);
        Ok(order
            .into_iter()
            .map(move |i| preprocess(&dev, train.sample(&dev, i)))
            .batch_exact(self.batch_size)
            .collate()
            .stack())
    }

    pub fn val_batches(&self) -> Result<impl Iterator<Item = Batch> + '_, DatasetError> {
        let val = self.val.as_ref().ok_or(DatasetError::NotSetUp)?;
        Ok(self.in_order(val))
    }

    pub fn test_batches(&self) -> Result<impl Iterator<Item = Batch> + '_, DatasetError> {
        let test = self.test.as_ref().ok_or(DatasetError::NotSetUp)?;
        Ok(self.in_order(test))
    }

    fn in_order<'a, S: 'a>(&'a self, ds: &'a UcMerced<S>) -> impl Iterator<Item = Batch> + 'a {
        let dev = self.dev.clone();
        (0..ds.len())
            .map(move |i| preprocess(&dev, ds.sample(&dev, i)))
            .batch_exact(self.batch_size)
            .collate()
            .stack()
    }
}

/// Resizes to `IMAGE_SIZE` and one-hot encodes the label. A label outside
/// the class table encodes as all zeros.
fn preprocess(dev: &Cpu, sample: Sample) -> (ImageTensor, LabelTensor) {
    let (_, h, w) = *sample.image.shape();
    let mut chw = sample.image.as_vec();
    if (h, w) != (IMAGE_SIZE, IMAGE_SIZE) {
        chw = resize_chw(&chw, h, w);
    }
    let mut one_hotted = [0.0; NUM_CLASSES];
    if let Some(hot) = one_hotted.get_mut(sample.label) {
        *hot = 1.0;
    }
    (
        dev.tensor_from_vec(chw, (Const::<3>, Const::<IMAGE_SIZE>, Const::<IMAGE_SIZE>)),
        dev.tensor(one_hotted),
    )
}

fn resize_chw(chw: &[f32], h: usize, w: usize) -> Vec<f32> {
    let plane = h * w;
    let img = Rgb32FImage::from_fn(w as u32, h as u32, |x, y| {
        let i = y as usize * w + x as usize;
        Rgb([chw[i], chw[plane + i], chw[2 * plane + i]])
    });
    let size = IMAGE_SIZE as u32;
    let resized = image::imageops::resize(&img, size, size, FilterType::Triangle);

    let plane = IMAGE_SIZE * IMAGE_SIZE;
    let mut buf = vec![0.0; 3 * plane];
    for (i, px) in resized.pixels().enumerate() {
        for c in 0..3 {
            buf[c * plane + i] = px[c];
        }
    }
    buf
}
