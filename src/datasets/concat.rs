use dfdx::data::ExactSizeDataset;

/// Several datasets of the same type, indexed back to back.
pub struct ConcatDataset<'a, D> {
    parts: Vec<&'a D>,
    ends: Vec<usize>,
}

impl<'a, D: ExactSizeDataset> ConcatDataset<'a, D> {
    pub fn new(parts: Vec<&'a D>) -> Self {
        let mut concat = Self {
            parts: Vec::with_capacity(parts.len()),
            ends: Vec::with_capacity(parts.len()),
        };
        for part in parts {
            concat.push(part);
        }
        concat
    }

    pub fn push(&mut self, part: &'a D) {
        let end = self.ends.last().copied().unwrap_or(0) + part.len();
        self.parts.push(part);
        self.ends.push(end);
    }

    pub fn num_parts(&self) -> usize {
        self.parts.len()
    }

    fn locate(&self, index: usize) -> (usize, usize) {
        let part = self.ends.partition_point(|&end| end <= index);
        assert!(
            part < self.parts.len(),
            "index out of bounds: the len is {} but the index is {index}",
            self.len()
        );
        let start = if part == 0 { 0 } else { self.ends[part - 1] };
        (part, index - start)
    }
}

impl<'a, D: ExactSizeDataset> ExactSizeDataset for ConcatDataset<'a, D> {
    type Item<'b> = D::Item<'b> where Self: 'b;
    fn get(&self, index: usize) -> Self::Item<'_> {
        let (part, offset) = self.locate(index);
        self.parts[part].get(offset)
    }
    fn len(&self) -> usize {
        self.ends.last().copied().unwrap_or(0)
    }
}

impl<'a, D: ExactSizeDataset> std::ops::Add<&'a D> for ConcatDataset<'a, D> {
    type Output = ConcatDataset<'a, D>;
    fn add(mut self, rhs: &'a D) -> Self::Output {
        self.push(rhs);
        self
    }
}
