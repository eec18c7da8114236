//! Data produced by passes beyond their rewriting of the compilation unit.
//!
//! Most passes in this pipeline are pure transformations: the constant
//! folder, the declaration splitter, and the storage rewrite have nothing to
//! report once the tree is rewritten, which [`NoPassData`] records. The
//! storage allocator is the exception: its product is the slot table that
//! the storage rewrite consumes. Because one pass must read another's
//! output without the manager knowing every data type involved, outputs are
//! stored behind a dynamic type and downcast back to their concrete form at
//! the consuming pass.

use std::{any::Any, collections::HashMap, fmt::Debug, marker::PhantomData};

use derivative::Derivative;
use downcast_rs::Downcast;

use crate::compile::{
    pass::{ConcretePass, Pass, PassKey},
    unit::CompilationUnit,
};

/// A pass output as stored in the [`PassDataMap`]: dynamically typed, and
/// recovered as its concrete type by the pass that consumes it.
pub type PassData = Box<dyn PassDataOps>;

/// The operations required of a pass's output data.
///
/// # Self Bounds
///
/// The bounds on `Self` exist so that stored data stays useful behind the
/// dynamic type:
///
/// - [`Any`] and [`Downcast`] let a consuming pass recover the concrete
///   type it knows its dependency produced.
/// - [`Debug`] keeps the accumulated data printable when diagnosing a
///   pipeline failure.
pub trait PassDataOps
where
    Self: Any + Debug + Downcast,
{
}

impl dyn PassDataOps {
    /// Views the dynamic data as the concrete data type `T`, returning
    /// [`None`] if `T` is not what was stored.
    pub fn view_as<T: ConcretePassData>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Marks a concrete data type as the output of one specific pass.
///
/// The associated pass is what keys the data in the [`PassDataMap`]: asking
/// the map for the allocator's output means asking for the data of the
/// allocator pass, not for a data type in isolation.
pub trait ConcretePassData
where
    Self: Clone + Debug + PassDataOps,
{
    /// The pass that produces this data.
    type Pass: ConcretePass;
}

/// The output of a pass whose whole result is the rewritten unit.
#[derive(Derivative)]
#[derivative(Clone(bound = ""), Debug(bound = ""))]
pub struct NoPassData<P> {
    /// Mark the owning pass type as used.
    _pass: PhantomData<P>,
}

impl<P> NoPassData<P> {
    /// Creates a new instance of the empty pass data.
    #[must_use]
    pub fn new() -> Self {
        Self { _pass: PhantomData }
    }
}

impl<P: ConcretePass> NoPassData<P> {
    /// Creates a new boxed instance of the empty pass data.
    #[must_use]
    pub fn new_dyn() -> PassData {
        Box::new(Self::new())
    }
}

impl<P> Default for NoPassData<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ConcretePass> PassDataOps for NoPassData<P> {}

impl<P: ConcretePass> ConcretePassData for NoPassData<P> {
    type Pass = P;
}

/// What a pass hands back to the manager: the compilation unit it was given,
/// possibly rewritten, and whatever data it produced.
#[derive(Debug)]
pub struct PassReturnData {
    /// The newly-modified compilation unit.
    pub unit: CompilationUnit,

    /// The data returned by the pass.
    pub data: PassData,
}

impl PassReturnData {
    /// Creates a new instance of the pass return data.
    pub fn new(unit: CompilationUnit, data: PassData) -> Self {
        Self { unit, data }
    }

    /// Gets the returned data as the concrete data type `T`, returning
    /// [`None`] if `T` is not what the pass produced.
    #[must_use]
    pub fn data_as<T: ConcretePassData>(&self) -> Option<&T> {
        self.data.view_as::<T>()
    }

    /// Gets the returned data as the concrete data type `T`.
    ///
    /// # Panics
    ///
    /// If the pass did not produce an instance of `T`.
    #[must_use]
    pub fn unwrap_data_as<T: ConcretePassData>(&self) -> &T {
        self.data_as::<T>().unwrap_or_else(|| {
            panic!(
                "pass data was not a {}",
                std::any::type_name::<T>()
            )
        })
    }
}

/// The accumulated outputs of the passes that have run so far, keyed by
/// pass.
///
/// The manager writes into this after each pass completes; a later pass
/// reads its dependencies out of it, typed, via [`PassDataMap::get`]. It
/// always holds the latest output for each pass, since nothing in this
/// pipeline re-runs a pass within one compilation.
#[derive(Debug, Default)]
pub struct PassDataMap {
    /// The mapping from pass keys to pass data.
    mapping: HashMap<PassKey, PassData>,
}

impl PassDataMap {
    /// Constructs a new, empty, mapping from pass keys to pass data.
    #[must_use]
    pub fn new() -> Self {
        let mapping = HashMap::new();
        Self { mapping }
    }

    /// Gets the output of the pass `P` as its concrete data type, if `P`
    /// has run.
    #[must_use]
    pub fn get<P: ConcretePass>(&self) -> Option<&P::Data> {
        self.mapping.get(&P::key())?.view_as::<P::Data>()
    }

    /// Records the output of the provided dynamic `pass`, overwriting any
    /// previous output of the same pass.
    pub fn put_dyn(&mut self, pass: &Pass, data: PassData) {
        self.mapping.insert(pass.key_dyn(), data);
    }
}
