use ucmerced::datasets::{Test, UcMerced, UcMercedOptions};

fn main() {
    simple_logger::init_with_level(log::Level::Info).unwrap();

    let options = UcMercedOptions::default().download(true).checksum(true);
    let dataset = UcMerced::<Test>::with_options("./datasets/ucmerced", &options).unwrap();
    for i in 0..dataset.len().min(10) {
        let (img, lbl) = &dataset[i];
        img.save(std::format!("img-{i}-{}.png", dataset.label_name(*lbl).unwrap()))
            .unwrap();
    }
}
