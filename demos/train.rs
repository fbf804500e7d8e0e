use std::{num::NonZeroUsize, time::Instant};

use dfdx::{optim::Sgd, prelude::*};
use ucmerced::{
    datamodules::UcMercedDataModule,
    datasets::{ucmerced::NUM_CLASSES, UcMercedOptions},
};

type ResidualBlock<const C: usize, const D: usize> = (
    (Conv2D<C, D, 3, 1, 1>, BatchNorm2D<D>, MaxPool2D<3>, ReLU),
    Residual<(Conv2D<D, D, 3, 1, 1>, BatchNorm2D<D>, ReLU)>,
);

type SmallResnet<const NUM_CLASSES: usize> = (
    (Conv2D<3, 32, 3, 2>, BatchNorm2D<32>, ReLU, MaxPool2D<3, 2>),
    ResidualBlock<32, 64>,
    ResidualBlock<64, 128>,
    ResidualBlock<128, 256>,
    (AvgPoolGlobal, Linear<256, NUM_CLASSES>),
);

type Dev = Cpu;
type Dtype = f32;

fn main() {
    simple_logger::init_with_level(log::Level::Info).unwrap();

    let dev: Dev = Default::default();

    let mut model = dev.build_module::<SmallResnet<NUM_CLASSES>, Dtype>();
    let mut grads = model.alloc_grads();
    let mut opt = Sgd::new(&model, Default::default());

    let options = UcMercedOptions::default().download(true).checksum(true);
    let batch_size = NonZeroUsize::new(16).unwrap();
    let mut dm = UcMercedDataModule::new("./datasets/ucmerced", batch_size, options).seed(0);
    dm.prepare_data().unwrap();
    dm.setup().unwrap();

    for i_epoch in 0.. {
        for (img, lbl) in dm.train_batches(i_epoch).unwrap() {
            let start = Instant::now();
            let logits = model.forward_mut(img.traced(grads));
            let loss = cross_entropy_with_logits_loss(logits, lbl);
            let fwd_dur = start.elapsed();
            let loss_val = loss.array();

            let start = Instant::now();
            grads = loss.backward();
            let bwd_dur = start.elapsed();

            let start = Instant::now();
            opt.update(&mut model, &grads).unwrap();
            model.zero_grads(&mut grads);
            let opt_dur = start.elapsed();

            log::info!(
                "epoch={i_epoch} loss={loss_val} | fwd={:?} bwd={:?} opt={:?}",
                fwd_dur,
                bwd_dur,
                opt_dur
            );
        }

        let mut correct = 0;
        let mut total = 0;
        for (img, lbl) in dm.val_batches().unwrap() {
            let logits = model.forward(img);
            let (pred, truth) = (logits.as_vec(), lbl.as_vec());
            for (p, t) in pred.chunks(NUM_CLASSES).zip(truth.chunks(NUM_CLASSES)) {
                correct += (argmax(p) == argmax(t)) as usize;
                total += 1;
            }
        }
        log::info!("epoch={i_epoch} val accuracy={:.3}", correct as f32 / total.max(1) as f32);
    }
}

fn argmax(xs: &[f32]) -> usize {
    xs.iter()
        .enumerate()
        .fold((0, f32::MIN), |best, (i, &x)| if x > best.1 { (i, x) } else { best })
        .0
}
