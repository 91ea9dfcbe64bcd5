//! Built-in node definition library.
//!
//! The standard kinds a shader editor ships out of the box: constants,
//! scalar math, vector and color plumbing. The [NODELIB] registry implements
//! [Resolver] and can be handed straight to the execution engine; embedders
//! extend a [Registry] of their own with [Registry::insert] when they bring
//! custom kinds.

pub mod color;
pub mod constant;
pub mod math;
pub mod pass;
pub mod vector;

use std::collections::HashMap;

use map_macro::hash_map;

use crate::exec::definition::{NodeDefinition, Resolver};

/// A named collection of node definitions.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    definitions: HashMap<String, NodeDefinition>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The full built-in library.
    pub fn standard() -> Self {
        Self {
            definitions: hash_map! {
                // Constants
                "const_float".to_string() => constant::const_float(),
                "const_color".to_string() => constant::const_color(),

                // Scalar math
                "add".to_string() => math::add(),
                "subtract".to_string() => math::subtract(),
                "multiply".to_string() => math::multiply(),
                "divide".to_string() => math::divide(),
                "mix".to_string() => math::mix(),

                // Vectors
                "combine_vec3".to_string() => vector::combine_vec3(),
                "split_vec3".to_string() => vector::split_vec3(),
                "dot".to_string() => vector::dot(),

                // Colors
                "combine_color".to_string() => color::combine_color(),
                "split_color".to_string() => color::split_color(),

                // Plumbing
                "pass".to_string() => pass::pass(),
            },
        }
    }

    /// Register (or replace) a definition under a kind.
    pub fn insert(&mut self, kind: impl Into<String>, definition: NodeDefinition) {
        self.definitions.insert(kind.into(), definition);
    }

    /// Registered kinds in sorted order.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Resolver for Registry {
    fn resolve(&self, kind: &str) -> Option<&NodeDefinition> {
        self.definitions.get(kind)
    }
}

lazy_static::lazy_static! {
    /// The shared built-in registry.
    pub static ref NODELIB: Registry = Registry::standard();
}
