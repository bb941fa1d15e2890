//! Variables: named values read from a resource property and preprocessed
//! before any process runs.

use serde::{Deserialize, Serialize};

use crate::process::{execute_steps, ProcessContext, Step};
use crate::property::{PropertyKey, PropertyMap, PropertyPool};
use crate::standard_value::StandardValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub key: String,
    pub name: String,
    pub property_pool: PropertyPool,
    pub property_id: i32,
    #[serde(default)]
    pub preprocesses: Vec<Step>,
}

impl Variable {
    pub fn property_key(&self) -> PropertyKey {
        PropertyKey::new(self.property_pool, self.property_id)
    }
}

/// Resolve `variables` in declared order into `ctx`.
///
/// Each variable reads the bound property's value through `read_value` and
/// runs its preprocess steps against the property's type. Steps may
/// reference variables declared earlier; references to later ones see an
/// absent value. A variable whose property is missing from `properties`
/// resolves to absent.
pub fn resolve_variables<F>(
    variables: &[Variable],
    properties: &PropertyMap,
    read_value: F,
    ctx: &mut ProcessContext,
) where
    F: Fn(PropertyKey) -> Option<StandardValue>,
{
    for variable in variables {
        let key = variable.property_key();
        let value = match properties.get(key) {
            Some(property) => {
                execute_steps(property.property_type, read_value(key), &variable.preprocesses, ctx)
            }
            None => {
                tracing::warn!(variable = %variable.key, property = %key, "Variable property missing, resolving to absent");
                None
            }
        };
        ctx.set_variable(variable.key.clone(), value);
    }
}
