//! Generation and memoisation of the Cairo helper functions that rewritten
//! AST nodes call into.
//!
//! The target has no native notion of EVM contract storage, so persistent
//! reads and writes lower to calls of generated Cairo functions that emulate
//! storage over a default-dict of field elements, with mapping cells
//! addressed by pedersen-hashing the base slot with the index.
//!
//! Every helper is registered under a canonical key derived from its
//! operation and type signature. Registration is idempotent: repeated
//! requests with the same key return the same helper name and do not
//! regenerate source. The accumulated bodies, together with the Cairo
//! imports they need, form the preamble emitted ahead of the translated
//! contract.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use bimap::BiMap;
use itertools::Itertools;
use stc_ast::{
    node::{FunctionCall, Identifier, Literal, LiteralKind, Node, NodeId, NodeKind},
    types::TypeNode,
    AstContext,
};
use stc_errors::transpile::{Error, Result};

use crate::cairo::{canonical_mangle, CairoType};

/// The per-compilation registry of generated Cairo helper functions.
///
/// The registry is owned by the compilation unit and threaded through the
/// passes alongside the AST; nothing here is shared across compilations.
#[derive(Debug, Default)]
pub struct HelperRegistry {
    /// The bidirectional mapping from canonical signature keys to generated
    /// helper names.
    ///
    /// The reverse direction exists to detect the (unlikely but possible)
    /// case of two distinct signatures mangling to the same name, which
    /// must fail loudly rather than silently merging helpers.
    names: BiMap<String, String>,

    /// The generated Cairo source body for each helper name.
    bodies: HashMap<String, String>,

    /// The Cairo imports required by the generated bodies, as a mapping
    /// from module path to imported symbols.
    imports: BTreeMap<String, BTreeSet<String>>,

    /// Helper names in registration order, which fixes the emission order
    /// of the preamble.
    order: Vec<String>,
}

impl HelperRegistry {
    /// Creates a new, empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the number of distinct helpers registered so far.
    #[must_use]
    pub fn helper_count(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` iff a helper with the provided `name` has been
    /// registered.
    #[must_use]
    pub fn contains_helper(&self, name: &str) -> bool {
        self.bodies.contains_key(name)
    }

    /// Renders the Cairo preamble: the accumulated imports followed by
    /// every helper body, in registration order.
    #[must_use]
    pub fn preamble(&self) -> String {
        let imports = self
            .imports
            .iter()
            .map(|(module, symbols)| {
                format!("from {module} import {}", symbols.iter().join(", "))
            })
            .join("\n");
        let bodies = self.order.iter().map(|name| &self.bodies[name]).join("\n\n");

        if imports.is_empty() {
            bodies
        } else {
            format!("{imports}\n\n{bodies}")
        }
    }

    /// Registers a helper under the provided canonical `key`, generating
    /// its body only on first registration.
    ///
    /// # Errors
    ///
    /// - [`Error::AssertionFailure`] if a distinct key mangles to an
    ///   already-taken helper name.
    fn register(
        &mut self,
        key: String,
        name: String,
        imports: &[(&str, &str)],
        body: impl FnOnce() -> String,
    ) -> Result<String> {
        if let Some(existing) = self.names.get_by_left(&key) {
            return Ok(existing.clone());
        }

        if self.names.contains_right(&name) {
            Err(Error::AssertionFailure(format!(
                "helper name collision: `{name}` already generated for a different signature"
            )))?;
        }

        for (module, symbol) in imports {
            self.imports
                .entry((*module).to_string())
                .or_default()
                .insert((*symbol).to_string());
        }

        self.bodies.insert(name.clone(), body());
        self.order.push(name.clone());
        self.names.insert(key, name.clone());
        Ok(name)
    }

    /// Ensures the storage-read helper for the provided value
    /// representation exists, returning its name.
    fn ensure_storage_read(&mut self, value: &CairoType) -> Result<String> {
        let key = format!("storageRead({value})");
        let name = format!("storageRead_{}", canonical_mangle(&value.to_string()));
        let body = || {
            if matches!(value, CairoType::Uint256) {
                format!(
                    "func {name}{{storage_ptr: DictAccess*, range_check_ptr}}(loc: felt) -> (value: Uint256):\n\
                     \x20   let (low) = dict_read{{dict_ptr=storage_ptr}}(key=loc)\n\
                     \x20   let (high) = dict_read{{dict_ptr=storage_ptr}}(key=loc + 1)\n\
                     \x20   return (value=Uint256(low=low, high=high))\n\
                     end"
                )
            } else {
                format!(
                    "func {name}{{storage_ptr: DictAccess*, range_check_ptr}}(loc: felt) -> (value: {value}):\n\
                     \x20   let (value) = dict_read{{dict_ptr=storage_ptr}}(key=loc)\n\
                     \x20   return (value=value)\n\
                     end"
                )
            }
        };

        let mut imports = vec![
            ("starkware.cairo.common.dict", "dict_read"),
            ("starkware.cairo.common.dict_access", "DictAccess"),
        ];
        if matches!(value, CairoType::Uint256) {
            imports.push(("starkware.cairo.common.uint256", "Uint256"));
        }

        self.register(key, name.clone(), &imports, body)
    }

    /// Ensures the storage-write helper for the provided value
    /// representation exists, returning its name.
    fn ensure_storage_write(&mut self, value: &CairoType) -> Result<String> {
        let key = format!("storageWrite({value})");
        let name = format!("storageWrite_{}", canonical_mangle(&value.to_string()));
        let body = || {
            if matches!(value, CairoType::Uint256) {
                format!(
                    "func {name}{{storage_ptr: DictAccess*, range_check_ptr}}(loc: felt, value: Uint256) -> ():\n\
                     \x20   dict_write{{dict_ptr=storage_ptr}}(key=loc, new_value=value.low)\n\
                     \x20   dict_write{{dict_ptr=storage_ptr}}(key=loc + 1, new_value=value.high)\n\
                     \x20   return ()\n\
                     end"
                )
            } else {
                format!(
                    "func {name}{{storage_ptr: DictAccess*, range_check_ptr}}(loc: felt, value: {value}) -> ():\n\
                     \x20   dict_write{{dict_ptr=storage_ptr}}(key=loc, new_value=value)\n\
                     \x20   return ()\n\
                     end"
                )
            }
        };

        let mut imports = vec![
            ("starkware.cairo.common.dict", "dict_write"),
            ("starkware.cairo.common.dict_access", "DictAccess"),
        ];
        if matches!(value, CairoType::Uint256) {
            imports.push(("starkware.cairo.common.uint256", "Uint256"));
        }

        self.register(key, name.clone(), &imports, body)
    }

    /// Renders the hashing prologue deriving a mapping cell from the base
    /// slot and the index, pedersen-hashing both limbs for wide keys.
    fn mapping_location(key: &CairoType) -> &'static str {
        if matches!(key, CairoType::Uint256) {
            "    let (index_hash) = hash2{hash_ptr=pedersen_ptr}(base, index.low)\n\
             \x20   let (loc) = hash2{hash_ptr=pedersen_ptr}(index_hash, index.high)"
        } else {
            "    let (loc) = hash2{hash_ptr=pedersen_ptr}(base, index)"
        }
    }

    /// Ensures the mapping-read helper for the provided key and value
    /// source types exists, returning its name.
    ///
    /// The helper derives the cell address and then delegates to the
    /// matching storage-read helper, which is registered as a side effect.
    fn ensure_read_mapping(&mut self, key_ty: &TypeNode, value_ty: &TypeNode) -> Result<String> {
        let key_cairo = CairoType::from_type_node(key_ty)?;

        let key = format!("readMapping({key_ty},{value_ty})");
        let name = format!(
            "readMapping_{}_{}",
            canonical_mangle(&key_ty.to_string()),
            canonical_mangle(&value_ty.to_string())
        );
        let location = Self::mapping_location(&key_cairo);

        // A mapping-valued cell has no stored value of its own: its "value"
        // is the base of the inner mapping, which is the derived location
        // itself. Anything else reads the cell through the storage helper.
        let read = if value_ty.strip_pointer().is_mapping() {
            None
        } else {
            let value_cairo = CairoType::from_type_node(value_ty)?;
            let read = self.ensure_storage_read(&value_cairo)?;
            Some((read, value_cairo))
        };

        let body = || match &read {
            Some((read, value_cairo)) => {
                format!(
                    "func {name}{{pedersen_ptr: HashBuiltin*, storage_ptr: DictAccess*, range_check_ptr}}(base: felt, index: {key_cairo}) -> (value: {value_cairo}):\n\
                     {location}\n\
                     \x20   let (value) = {read}(loc)\n\
                     \x20   return (value=value)\n\
                     end"
                )
            }
            None => format!(
                "func {name}{{pedersen_ptr: HashBuiltin*, storage_ptr: DictAccess*, range_check_ptr}}(base: felt, index: {key_cairo}) -> (value: felt):\n\
                 {location}\n\
                 \x20   return (value=loc)\n\
                 end"
            ),
        };

        let imports = [
            ("starkware.cairo.common.cairo_builtins", "HashBuiltin"),
            ("starkware.cairo.common.hash", "hash2"),
        ];
        self.register(key, name.clone(), &imports, body)
    }

    /// Ensures the mapping-write helper for the provided key and value
    /// source types exists, returning its name.
    fn ensure_write_mapping(&mut self, key_ty: &TypeNode, value_ty: &TypeNode) -> Result<String> {
        if value_ty.strip_pointer().is_mapping() {
            Err(Error::NotSupportedYet(format!(
                "assignment of a whole mapping value ({value_ty})"
            )))?;
        }

        let key_cairo = CairoType::from_type_node(key_ty)?;
        let value_cairo = CairoType::from_type_node(value_ty)?;
        let write = self.ensure_storage_write(&value_cairo)?;

        let key = format!("writeMapping({key_ty},{value_ty})");
        let name = format!(
            "writeMapping_{}_{}",
            canonical_mangle(&key_ty.to_string()),
            canonical_mangle(&value_ty.to_string())
        );
        let location = Self::mapping_location(&key_cairo);
        let body = || {
            format!(
                "func {name}{{pedersen_ptr: HashBuiltin*, storage_ptr: DictAccess*, range_check_ptr}}(base: felt, index: {key_cairo}, value: {value_cairo}) -> ():\n\
                 {location}\n\
                 \x20   {write}(loc, value)\n\
                 \x20   return ()\n\
                 end"
            )
        };

        let imports = [
            ("starkware.cairo.common.cairo_builtins", "HashBuiltin"),
            ("starkware.cairo.common.hash", "hash2"),
        ];
        self.register(key, name.clone(), &imports, body)
    }

    /// Builds a call of the named helper with the provided `arguments`,
    /// returning its id.
    fn build_call(
        ctx: &mut AstContext,
        name: String,
        arguments: Vec<NodeId>,
        ty: Option<TypeNode>,
    ) -> NodeId {
        let callee = ctx.insert(Node::new(NodeKind::Identifier(Identifier {
            name,
            referenced_declaration: None,
        })));
        let mut call = Node::new(NodeKind::FunctionCall(FunctionCall { callee, arguments }));
        call.ty = ty;
        ctx.insert(call)
    }

    /// Synthesises a number literal denoting the provided storage `slot`.
    pub fn slot_literal(ctx: &mut AstContext, slot: usize) -> NodeId {
        ctx.insert(Node::typed(
            NodeKind::Literal(Literal {
                kind:      LiteralKind::Number,
                value:     slot.to_string(),
                hex_value: format!("{slot:x}"),
            }),
            TypeNode::Builtin(format!("int_const {slot}")),
        ))
    }

    /// Builds a call reading the state variable at `slot` as a value of
    /// the provided source type, registering the helper it invokes.
    ///
    /// # Errors
    ///
    /// - [`Error::UnhandledType`] if the value type has no Cairo
    ///   representation.
    pub fn storage_read(
        &mut self,
        ctx: &mut AstContext,
        slot: usize,
        value_ty: &TypeNode,
    ) -> Result<NodeId> {
        let cairo_value = CairoType::from_type_node(value_ty.strip_pointer())?;
        let name = self.ensure_storage_read(&cairo_value)?;
        let slot = Self::slot_literal(ctx, slot);
        Ok(Self::build_call(
            ctx,
            name,
            vec![slot],
            Some(value_ty.clone()),
        ))
    }

    /// Builds a call writing `value` into the state variable at `slot`,
    /// registering the helper it invokes.
    ///
    /// # Errors
    ///
    /// - [`Error::UnhandledType`] if the value type has no Cairo
    ///   representation.
    pub fn storage_write(
        &mut self,
        ctx: &mut AstContext,
        slot: usize,
        value_ty: &TypeNode,
        value: NodeId,
    ) -> Result<NodeId> {
        let cairo_value = CairoType::from_type_node(value_ty.strip_pointer())?;
        let name = self.ensure_storage_write(&cairo_value)?;
        let slot = Self::slot_literal(ctx, slot);
        Ok(Self::build_call(ctx, name, vec![slot, value], None))
    }

    /// Builds a call reading the cell of the mapping based at `base` under
    /// `index`, registering the helper it invokes.
    ///
    /// # Errors
    ///
    /// - [`Error::UnhandledType`] if the key or value type has no Cairo
    ///   representation.
    pub fn read_mapping(
        &mut self,
        ctx: &mut AstContext,
        base: NodeId,
        index: NodeId,
        key_ty: &TypeNode,
        value_ty: &TypeNode,
    ) -> Result<NodeId> {
        let name = self.ensure_read_mapping(key_ty, value_ty)?;
        Ok(Self::build_call(
            ctx,
            name,
            vec![base, index],
            Some(value_ty.clone()),
        ))
    }

    /// Builds a call writing `value` into the cell of the mapping based at
    /// `base` under `index`, registering the helper it invokes.
    ///
    /// # Errors
    ///
    /// - [`Error::UnhandledType`] if the key or value type has no Cairo
    ///   representation.
    pub fn write_mapping(
        &mut self,
        ctx: &mut AstContext,
        base: NodeId,
        index: NodeId,
        key_ty: &TypeNode,
        value_ty: &TypeNode,
        value: NodeId,
    ) -> Result<NodeId> {
        let name = self.ensure_write_mapping(key_ty, value_ty)?;
        Ok(Self::build_call(ctx, name, vec![base, index, value], None))
    }
}

#[cfg(test)]
mod test {
    use stc_ast::{types::TypeNode, AstContext};

    use crate::helpers::HelperRegistry;

    #[test]
    fn repeated_registration_is_idempotent() {
        let mut ctx = AstContext::new();
        let mut helpers = HelperRegistry::new();

        let first = helpers.storage_read(&mut ctx, 0, &TypeNode::uint(8)).unwrap();
        let second = helpers.storage_read(&mut ctx, 3, &TypeNode::Bool).unwrap();

        // Distinct call sites, same signature: one helper body.
        assert_ne!(first, second);
        assert_eq!(helpers.helper_count(), 1);
        assert!(helpers.contains_helper("storageRead_felt"));
    }

    #[test]
    fn distinct_representations_get_distinct_helpers() {
        let mut ctx = AstContext::new();
        let mut helpers = HelperRegistry::new();

        helpers.storage_read(&mut ctx, 0, &TypeNode::uint(8)).unwrap();
        helpers.storage_read(&mut ctx, 1, &TypeNode::uint(256)).unwrap();

        assert_eq!(helpers.helper_count(), 2);
        assert!(helpers.contains_helper("storageRead_felt"));
        assert!(helpers.contains_helper("storageRead_Uint256"));
    }

    #[test]
    fn mapping_helpers_delegate_to_storage_helpers() {
        let mut ctx = AstContext::new();
        let mut helpers = HelperRegistry::new();
        let base = HelperRegistry::slot_literal(&mut ctx, 2);
        let index = HelperRegistry::slot_literal(&mut ctx, 0);
        let value = HelperRegistry::slot_literal(&mut ctx, 1);

        helpers
            .write_mapping(
                &mut ctx,
                base,
                index,
                &TypeNode::uint(256),
                &TypeNode::uint(256),
                value,
            )
            .unwrap();

        assert!(helpers.contains_helper("writeMapping_uint256_uint256"));
        assert!(helpers.contains_helper("storageWrite_Uint256"));

        let preamble = helpers.preamble();
        assert!(preamble.contains("from starkware.cairo.common.hash import hash2"));
        assert!(preamble.contains("func writeMapping_uint256_uint256"));
    }

    #[test]
    fn preamble_orders_imports_before_bodies() {
        let mut ctx = AstContext::new();
        let mut helpers = HelperRegistry::new();
        helpers.storage_read(&mut ctx, 0, &TypeNode::uint(8)).unwrap();

        let preamble = helpers.preamble();
        let import_at = preamble.find("from starkware.cairo.common.dict import dict_read");
        let body_at = preamble.find("func storageRead_felt");
        assert!(import_at.unwrap() < body_at.unwrap());
    }
}
