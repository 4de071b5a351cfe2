use std::collections::BTreeMap;

use crate::blob::Blob;
use crate::error::CoreError;
use crate::filler::LayerRng;
use crate::nn::layer::Layer;
use crate::numeric::Dtype;

/// An ordered list of layers wired together through named blobs.
///
/// Layers run in insertion order. Each layer names its bottom blobs (which must
/// already exist, either as net inputs or as tops of earlier layers) and its top
/// blobs (created on first use). A top that repeats one of the layer's own bottom
/// names is computed in place.
#[derive(Debug)]
pub struct Net<T: Dtype> {
    name: String,
    layers: Vec<Box<dyn Layer<T>>>,
    layer_names: Vec<String>,
    blobs: Vec<Blob<T>>,
    blob_names: Vec<String>,
    blob_index: BTreeMap<String, usize>,
    input_blob_ids: Vec<usize>,
    bottom_ids: Vec<Vec<usize>>,
    top_ids: Vec<Vec<usize>>,
}

impl<T: Dtype> Net<T> {
    pub fn new(name: &str) -> Self {
        Net {
            name: name.to_string(),
            layers: Vec::new(),
            layer_names: Vec::new(),
            blobs: Vec::new(),
            blob_names: Vec::new(),
            blob_index: BTreeMap::new(),
            input_blob_ids: Vec::new(),
            bottom_ids: Vec::new(),
            top_ids: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares an input blob fed by [`Net::forward`].
    pub fn add_input(&mut self, name: &str, shape: &[usize]) -> Result<(), CoreError> {
        let id = self.push_blob(name, Blob::new(shape))?;
        self.input_blob_ids.push(id);
        Ok(())
    }

    /// Appends a layer and sets it up on its (aliased) bottom and top blobs.
    pub fn add_layer(
        &mut self,
        name: &str,
        mut layer: Box<dyn Layer<T>>,
        bottoms: &[&str],
        tops: &[&str],
    ) -> Result<(), CoreError> {
        if self.layer_names.iter().any(|existing| existing == name) {
            return Err(CoreError::DuplicateLayer(name.to_string()));
        }
        let bottom_ids = bottoms
            .iter()
            .map(|&blob| {
                self.blob_index
                    .get(blob)
                    .copied()
                    .ok_or_else(|| CoreError::UnknownBlob(blob.to_string()))
            })
            .collect::<Result<Vec<usize>, _>>()?;

        let mut top_ids = Vec::with_capacity(tops.len());
        for &blob in tops {
            let id = match self.blob_index.get(blob) {
                Some(&id) if bottom_ids.contains(&id) => id,
                Some(_) => return Err(CoreError::DuplicateBlob(blob.to_string())),
                None => self.push_blob(blob, Blob::empty())?,
            };
            top_ids.push(id);
        }

        let bottom_vec = self.aliases(&bottom_ids);
        let top_vec = self.aliases(&top_ids);
        layer.setup(&bottom_vec, &top_vec)?;
        log::debug!(
            "Net '{}': added layer '{}' ({}) with bottoms {:?} and tops {:?}",
            self.name,
            name,
            layer.type_name(),
            bottoms,
            tops
        );

        self.layers.push(layer);
        self.layer_names.push(name.to_string());
        self.bottom_ids.push(bottom_ids);
        self.top_ids.push(top_ids);
        Ok(())
    }

    /// Copies `input` into the input blobs and runs every layer in order.
    ///
    /// Each input must have the shape it was declared with. Returns the summed loss contribution of all layers.
    pub fn forward(&mut self, input: &[Blob<T>], rng: &mut LayerRng) -> Result<T, CoreError> {
        if input.len() != self.input_blob_ids.len() {
            return Err(CoreError::BlobArity {
                layer: self.name.clone(),
                kind: "input",
                expected: self.input_blob_ids.len(),
                actual: input.len(),
            });
        }
        for (&id, source) in self.input_blob_ids.iter().zip(input) {
            let declared = self.blobs[id].shape();
            if source.shape() != declared {
                return Err(CoreError::ShapeMismatch {
                    expected: declared,
                    actual: source.shape(),
                    operation: format!("Net '{}' input '{}'", self.name, self.blob_names[id]),
                });
            }
            self.blobs[id].copy_from(source, false, false)?;
        }
        let mut loss = T::zero();
        for i in 0..self.layers.len() {
            let bottom = self.aliases(&self.bottom_ids[i]);
            let top = self.aliases(&self.top_ids[i]);
            loss += self.layers[i].forward(&bottom, &top, rng)?;
        }
        Ok(loss)
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer_names(&self) -> &[String] {
        &self.layer_names
    }

    pub fn layer_mut(&mut self, index: usize) -> Result<&mut Box<dyn Layer<T>>, CoreError> {
        let count = self.layers.len();
        self.layers
            .get_mut(index)
            .ok_or(CoreError::IndexOutOfBounds { index, count })
    }

    /// Aliases of the bottom blobs of layer `index`.
    pub fn bottom_vec(&self, index: usize) -> Result<Vec<Blob<T>>, CoreError> {
        self.bottom_ids
            .get(index)
            .map(|ids| self.aliases(ids))
            .ok_or(CoreError::IndexOutOfBounds {
                index,
                count: self.layers.len(),
            })
    }

    /// Aliases of the top blobs of layer `index`.
    pub fn top_vec(&self, index: usize) -> Result<Vec<Blob<T>>, CoreError> {
        self.top_ids
            .get(index)
            .map(|ids| self.aliases(ids))
            .ok_or(CoreError::IndexOutOfBounds {
                index,
                count: self.layers.len(),
            })
    }

    pub fn blob_by_name(&self, name: &str) -> Option<Blob<T>> {
        self.blob_index.get(name).map(|&id| self.blobs[id].alias())
    }

    pub fn blob_names(&self) -> &[String] {
        &self.blob_names
    }

    fn push_blob(&mut self, name: &str, blob: Blob<T>) -> Result<usize, CoreError> {
        if self.blob_index.contains_key(name) {
            return Err(CoreError::DuplicateBlob(name.to_string()));
        }
        let id = self.blobs.len();
        self.blobs.push(blob);
        self.blob_names.push(name.to_string());
        self.blob_index.insert(name.to_string(), id);
        Ok(id)
    }

    fn aliases(&self, ids: &[usize]) -> Vec<Blob<T>> {
        ids.iter().map(|&id| self.blobs[id].alias()).collect()
    }
}

#[cfg(test)]
#[path = "net_test.rs"]
mod tests;
