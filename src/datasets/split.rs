use std::{collections::HashSet, fs::File, io::BufRead, io::BufReader, path::Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetSplit {
    Train,
    Val,
    Test,
}

impl DatasetSplit {
    pub const ALL: [DatasetSplit; 3] = [DatasetSplit::Train, DatasetSplit::Val, DatasetSplit::Test];

    pub fn name(&self) -> &'static str {
        match self {
            DatasetSplit::Train => "train",
            DatasetSplit::Val => "val",
            DatasetSplit::Test => "test",
        }
    }
}

impl std::fmt::Display for DatasetSplit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub trait Split: Copy + Default {
    const SPLIT: DatasetSplit;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Train;

#[derive(Debug, Default, Clone, Copy)]
pub struct Val;

#[derive(Debug, Default, Clone, Copy)]
pub struct Test;

impl Split for Train {
    const SPLIT: DatasetSplit = DatasetSplit::Train;
}

impl Split for Val {
    const SPLIT: DatasetSplit = DatasetSplit::Val;
}

impl Split for Test {
    const SPLIT: DatasetSplit = DatasetSplit::Test;
}

/// Reads a split list: one image file name per line.
pub fn read_split_list<P: AsRef<Path>>(path: P) -> Result<HashSet<String>, std::io::Error> {
    let r = BufReader::new(File::open(path)?);
    let mut names = HashSet::new();
    for line in r.lines() {
        let line = line?;
        let name = line.trim();
        if !name.is_empty() {
            names.insert(name.to_owned());
        }
    }
    Ok(names)
}
