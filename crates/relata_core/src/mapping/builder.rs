//! Mapping construction and validation.

use super::class::ClassDefinition;
use super::property::PropertyDefinition;
use super::relation::{Cardinality, RelationEndPointDefinition};
use super::MappingConfiguration;
use crate::error::{CoreError, CoreResult};
use crate::object::ClassId;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Declares one mapped class.
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    id: ClassId,
    base: Option<ClassId>,
    is_abstract: bool,
    properties: Vec<PropertyDefinition>,
}

impl ClassBuilder {
    /// Starts a class declaration.
    pub fn new(id: impl Into<ClassId>) -> Self {
        Self {
            id: id.into(),
            base: None,
            is_abstract: false,
            properties: Vec::new(),
        }
    }

    /// Derives this class from `base`.
    #[must_use]
    pub fn inherits(mut self, base: impl Into<ClassId>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Marks the class abstract.
    #[must_use]
    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Adds a value property.
    #[must_use]
    pub fn property(mut self, property: PropertyDefinition) -> Self {
        self.properties.push(property);
        self
    }
}

#[derive(Debug, Clone)]
enum RelationShape {
    OneToOne {
        virtual_class: ClassId,
        virtual_property: String,
        real_class: ClassId,
        real_property: String,
    },
    OneToMany {
        one_class: ClassId,
        collection_property: String,
        many_class: ClassId,
        foreign_key_property: String,
    },
    Unidirectional {
        class: ClassId,
        property: String,
        target: ClassId,
    },
}

/// Declares one relation.
#[derive(Debug, Clone)]
pub struct RelationBuilder {
    shape: RelationShape,
    mandatory_foreign_key: bool,
    mandatory_opposite: bool,
}

impl RelationBuilder {
    fn with_shape(shape: RelationShape) -> Self {
        Self {
            shape,
            mandatory_foreign_key: false,
            mandatory_opposite: false,
        }
    }

    /// Declares a bidirectional one-to-one relation. The foreign key lives on
    /// `real_class.foreign_key_property`; `virtual_class.virtual_property`
    /// is derived from it.
    pub fn one_to_one(
        virtual_class: impl Into<ClassId>,
        virtual_property: impl Into<String>,
        real_class: impl Into<ClassId>,
        foreign_key_property: impl Into<String>,
    ) -> Self {
        Self::with_shape(RelationShape::OneToOne {
            virtual_class: virtual_class.into(),
            virtual_property: virtual_property.into(),
            real_class: real_class.into(),
            real_property: foreign_key_property.into(),
        })
    }

    /// Declares a bidirectional one-to-many relation. Each
    /// `many_class.foreign_key_property` points at the owning object, whose
    /// `one_class.collection_property` holds the ordered collection.
    pub fn one_to_many(
        one_class: impl Into<ClassId>,
        collection_property: impl Into<String>,
        many_class: impl Into<ClassId>,
        foreign_key_property: impl Into<String>,
    ) -> Self {
        Self::with_shape(RelationShape::OneToMany {
            one_class: one_class.into(),
            collection_property: collection_property.into(),
            many_class: many_class.into(),
            foreign_key_property: foreign_key_property.into(),
        })
    }

    /// Declares a unidirectional reference with no navigable opposite.
    pub fn unidirectional(
        class: impl Into<ClassId>,
        foreign_key_property: impl Into<String>,
        target: impl Into<ClassId>,
    ) -> Self {
        Self::with_shape(RelationShape::Unidirectional {
            class: class.into(),
            property: foreign_key_property.into(),
            target: target.into(),
        })
    }

    /// Requires the foreign-key side to be set at commit.
    #[must_use]
    pub fn mandatory_foreign_key(mut self) -> Self {
        self.mandatory_foreign_key = true;
        self
    }

    /// Requires the virtual side to be non-empty at commit.
    #[must_use]
    pub fn mandatory_opposite(mut self) -> Self {
        self.mandatory_opposite = true;
        self
    }

    fn into_end_points(self) -> Vec<RelationEndPointDefinition> {
        match self.shape {
            RelationShape::OneToOne {
                virtual_class,
                virtual_property,
                real_class,
                real_property,
            } => {
                let relation_id =
                    format!("{real_class}.{real_property}<->{virtual_class}.{virtual_property}");
                vec![
                    RelationEndPointDefinition::new(
                        relation_id.clone(),
                        real_class.clone(),
                        real_property.clone(),
                        Cardinality::One,
                        false,
                        self.mandatory_foreign_key,
                        virtual_class.clone(),
                        Some(virtual_property.clone()),
                    ),
                    RelationEndPointDefinition::new(
                        relation_id,
                        virtual_class,
                        virtual_property,
                        Cardinality::One,
                        true,
                        self.mandatory_opposite,
                        real_class,
                        Some(real_property),
                    ),
                ]
            }
            RelationShape::OneToMany {
                one_class,
                collection_property,
                many_class,
                foreign_key_property,
            } => {
                let relation_id = format!(
                    "{many_class}.{foreign_key_property}<->{one_class}.{collection_property}"
                );
                vec![
                    RelationEndPointDefinition::new(
                        relation_id.clone(),
                        many_class.clone(),
                        foreign_key_property.clone(),
                        Cardinality::One,
                        false,
                        self.mandatory_foreign_key,
                        one_class.clone(),
                        Some(collection_property.clone()),
                    ),
                    RelationEndPointDefinition::new(
                        relation_id,
                        one_class,
                        collection_property,
                        Cardinality::Many,
                        true,
                        self.mandatory_opposite,
                        many_class,
                        Some(foreign_key_property),
                    ),
                ]
            }
            RelationShape::Unidirectional {
                class,
                property,
                target,
            } => vec![RelationEndPointDefinition::new(
                format!("{class}.{property}->{target}"),
                class,
                property,
                Cardinality::One,
                false,
                self.mandatory_foreign_key,
                target,
                None,
            )],
        }
    }
}

/// Collects class and relation declarations into a [`MappingConfiguration`].
#[derive(Debug, Clone, Default)]
pub struct MappingBuilder {
    classes: Vec<ClassBuilder>,
    relations: Vec<RelationBuilder>,
}

#[derive(Debug, Default)]
struct DeclaredClass {
    base: Option<ClassId>,
    is_abstract: bool,
    properties: Vec<Arc<PropertyDefinition>>,
    end_points: Vec<Arc<RelationEndPointDefinition>>,
}

impl MappingBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a class.
    #[must_use]
    pub fn class(mut self, class: ClassBuilder) -> Self {
        self.classes.push(class);
        self
    }

    /// Adds a relation.
    #[must_use]
    pub fn relation(mut self, relation: RelationBuilder) -> Self {
        self.relations.push(relation);
        self
    }

    /// Validates all declarations and resolves inheritance.
    pub fn build(self) -> CoreResult<MappingConfiguration> {
        let mut declared: BTreeMap<ClassId, DeclaredClass> = BTreeMap::new();
        for class in self.classes {
            if declared.contains_key(&class.id) {
                return Err(CoreError::mapping(format!(
                    "class {} is declared twice",
                    class.id
                )));
            }
            let mut properties = Vec::with_capacity(class.properties.len());
            for property in class.properties {
                property.validate(&property.default_value()).map_err(|e| {
                    CoreError::mapping(format!(
                        "default of {}.{} is invalid: {e}",
                        class.id,
                        property.name()
                    ))
                })?;
                properties.push(Arc::new(property));
            }
            declared.insert(
                class.id,
                DeclaredClass {
                    base: class.base,
                    is_abstract: class.is_abstract,
                    properties,
                    end_points: Vec::new(),
                },
            );
        }

        for relation in self.relations {
            for end_point in relation.into_end_points() {
                if !declared.contains_key(end_point.opposite_class()) {
                    return Err(CoreError::unknown_class(end_point.opposite_class()));
                }
                let owner = declared
                    .get_mut(end_point.class_id())
                    .ok_or_else(|| CoreError::unknown_class(end_point.class_id()))?;
                if !end_point.is_virtual() {
                    owner.properties.push(Arc::new(PropertyDefinition::foreign_key(
                        end_point.property_name(),
                        end_point.opposite_class().clone(),
                    )));
                }
                owner.end_points.push(Arc::new(end_point));
            }
        }

        let mut resolved = BTreeMap::new();
        let ids: Vec<ClassId> = declared.keys().cloned().collect();
        for id in &ids {
            let mut visiting = Vec::new();
            resolve(id, &declared, &mut resolved, &mut visiting)?;
        }
        Ok(MappingConfiguration::from_classes(resolved))
    }
}

fn resolve(
    id: &ClassId,
    declared: &BTreeMap<ClassId, DeclaredClass>,
    resolved: &mut BTreeMap<ClassId, Arc<ClassDefinition>>,
    visiting: &mut Vec<ClassId>,
) -> CoreResult<Arc<ClassDefinition>> {
    if let Some(done) = resolved.get(id) {
        return Ok(Arc::clone(done));
    }
    if visiting.contains(id) {
        return Err(CoreError::mapping(format!(
            "inheritance cycle through class {id}"
        )));
    }
    let class = declared.get(id).ok_or_else(|| CoreError::unknown_class(id))?;
    visiting.push(id.clone());

    let (mut properties, mut end_points) = match &class.base {
        Some(base) => {
            if !declared.contains_key(base) {
                return Err(CoreError::mapping(format!(
                    "base class {base} of {id} is not mapped"
                )));
            }
            let base = resolve(base, declared, resolved, visiting)?;
            (base.properties().to_vec(), base.end_points().to_vec())
        }
        None => (Vec::new(), Vec::new()),
    };

    let mut property_names: HashSet<String> =
        properties.iter().map(|p| p.name().to_string()).collect();
    for property in &class.properties {
        if !property_names.insert(property.name().to_string()) {
            return Err(CoreError::mapping(format!(
                "property {} is declared twice on {id}",
                property.name()
            )));
        }
        properties.push(Arc::clone(property));
    }

    let mut end_point_names: HashSet<String> = end_points
        .iter()
        .map(|e| e.property_name().to_string())
        .collect();
    for end_point in &class.end_points {
        if !end_point_names.insert(end_point.property_name().to_string()) {
            return Err(CoreError::mapping(format!(
                "relation property {} is declared twice on {id}",
                end_point.property_name()
            )));
        }
        end_points.push(Arc::clone(end_point));
    }

    // A name may be both a stored property and an end point only for a foreign key.
    for property in &properties {
        if !property.is_foreign_key() && end_point_names.contains(property.name()) {
            return Err(CoreError::mapping(format!(
                "{}.{} is both a value property and a relation",
                id,
                property.name()
            )));
        }
    }

    visiting.pop();
    let definition = Arc::new(ClassDefinition::new(
        id.clone(),
        class.base.clone(),
        class.is_abstract,
        properties,
        end_points,
    ));
    resolved.insert(id.clone(), Arc::clone(&definition));
    Ok(definition)
}
