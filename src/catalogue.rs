//! Read-only riddle catalogue.

use std::{collections::BTreeMap, fs, io, path::Path, sync::Arc};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    convert::{decode_dataset, json_to_result},
    result::{Number, ResultValue},
    schema::{ElementType, FieldKind, RecordSchema, SchemaError},
    value::{Key, Record, Value},
};

#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("riddle '{0}' not found")]
    NotFound(String),

    #[error("duplicate riddle id '{0}'")]
    DuplicateId(String),

    #[error("riddle '{id}': {source}")]
    Schema {
        id: String,
        #[source]
        source: SchemaError,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A puzzle: a fixed input dataset and the output a correct script produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Riddle {
    pub id: String,
    pub description: String,
    pub element_type: ElementType,
    pub input: Vec<Value>,
    pub expected_output: ResultValue,
}

/// Read-only lookup of riddles by id.
pub trait RiddleRepository: Send + Sync {
    fn get_riddle(&self, id: &str) -> Result<Arc<Riddle>, CatalogueError>;

    /// All riddles, ordered by id
    fn riddles(&self) -> Vec<Arc<Riddle>>;
}

/// In-memory catalogue, loaded once and never mutated.
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    riddles: BTreeMap<String, Arc<Riddle>>,
}

impl RiddleRepository for Catalogue {
    fn get_riddle(&self, id: &str) -> Result<Arc<Riddle>, CatalogueError> {
        self.riddles
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogueError::NotFound(id.to_string()))
    }

    fn riddles(&self) -> Vec<Arc<Riddle>> {
        self.riddles.values().cloned().collect()
    }
}

/// One entry of a JSON catalogue document
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RiddleEntry {
    id: String,
    description: String,
    record_name: Option<String>,
    natural_key: Option<String>,
    input: serde_json::Value,
    expected_output: serde_json::Value,
}

impl Catalogue {
    pub fn new(riddles: impl IntoIterator<Item = Riddle>) -> Result<Self, CatalogueError> {
        let mut catalogue = Catalogue::default();
        for riddle in riddles {
            catalogue.insert(riddle)?;
        }
        Ok(catalogue)
    }

    fn insert(&mut self, riddle: Riddle) -> Result<(), CatalogueError> {
        if self.riddles.contains_key(&riddle.id) {
            return Err(CatalogueError::DuplicateId(riddle.id));
        }
        self.riddles.insert(riddle.id.clone(), Arc::new(riddle));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.riddles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.riddles.is_empty()
    }

    /// Load riddles from a JSON document.
    ///
    /// The document is an array of objects with `id`, `description`,
    /// `input`, `expectedOutput` and optionally `recordName` and
    /// `naturalKey`.
    ///
    /// # Examples
    ///
    /// ```
    /// use streamy::{Catalogue, RiddleRepository};
    ///
    /// let catalogue = Catalogue::from_json(r#"[
    ///     {"id": "evens", "description": "Keep the even numbers",
    ///      "input": [1, 2, 3, 4], "expectedOutput": [2, 4]}
    /// ]"#).unwrap();
    ///
    /// assert!(catalogue.get_riddle("evens").is_ok());
    /// ```
    pub fn from_json(document: &str) -> Result<Self, CatalogueError> {
        let entries: Vec<RiddleEntry> = serde_json::from_str(document)?;
        let riddles = entries
            .into_iter()
            .map(Self::decode_entry)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(riddles)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogueError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    fn decode_entry(entry: RiddleEntry) -> Result<Riddle, CatalogueError> {
        let schema_error = |source: SchemaError| CatalogueError::Schema {
            id: entry.id.clone(),
            source,
        };

        let (element_type, input) = decode_dataset(
            &entry.input,
            entry.record_name.as_deref(),
            entry.natural_key.as_deref(),
        )
        .map_err(schema_error)?;
        let expected_output =
            json_to_result(&entry.expected_output, &element_type).map_err(schema_error)?;

        Ok(Riddle {
            id: entry.id,
            description: entry.description,
            element_type,
            input,
            expected_output,
        })
    }

    /// Built-in safari riddles.
    pub fn safari() -> Result<Self, CatalogueError> {
        safari_riddles().and_then(Self::new)
    }
}

// ============================================================================
// Safari riddles
// ============================================================================

/// Record type of the safari dataset, naturally ordered by age
pub fn safari_animal_schema() -> Result<Arc<RecordSchema>, SchemaError> {
    RecordSchema::new(
        "SafariAnimal",
        vec![
            ("name", FieldKind::Text),
            ("species", FieldKind::Text),
            ("animalClass", FieldKind::Text),
            ("age", FieldKind::Number),
            ("weight", FieldKind::Number),
            ("predator", FieldKind::Boolean),
        ],
    )
    .with_natural_key("age")
    .map(Arc::new)
}

const BASE_ANIMALS: &[(&str, &str, i64, i64, bool)] = &[
    ("Henno the Hyena", "HYENA", 8, 60, true),
    ("Zembet the Zebra", "ZEBRA", 10, 300, false),
    ("Leo the Lion", "LION", 12, 190, true),
    ("Gigi the Giraffe", "GIRAFFE", 15, 800, false),
    ("Ello the Elephant", "ELEPHANT", 25, 6000, false),
    ("Hakka the Hyena", "HYENA", 6, 55, true),
    ("Zuri the Zebra", "ZEBRA", 7, 280, false),
    ("Luma the Lion", "LION", 9, 170, true),
    ("Garo the Giraffe", "GIRAFFE", 5, 600, false),
    ("Motu the Elephant", "ELEPHANT", 30, 6500, false),
];

/// The base safari dataset
pub fn base_animals(schema: &Arc<RecordSchema>) -> Result<Vec<Record>, SchemaError> {
    BASE_ANIMALS
        .iter()
        .map(|&(name, species, age, weight, predator)| {
            schema.record(vec![
                Value::Text(name.to_string()),
                Value::Text(species.to_string()),
                Value::Text("MAMMAL".to_string()),
                Value::Integer(age),
                Value::Integer(weight),
                Value::Boolean(predator),
            ])
        })
        .collect()
}

fn int_field(record: &Record, name: &str) -> i64 {
    match record.get(name) {
        Some(Value::Integer(n)) => *n,
        _ => 0,
    }
}

fn text_field(record: &Record, name: &str) -> String {
    record.get(name).and_then(Value::as_text).unwrap_or_default().to_string()
}

/// Label of the weight bucket an animal falls into
fn weight_range(weight: i64) -> &'static str {
    match weight {
        w if w < 200 => "0-200",
        w if w < 500 => "200-500",
        w if w < 1000 => "500-1000",
        _ => "1000+",
    }
}

/// First heaviest wins ties
fn heaviest<'a>(group: &[&'a Record]) -> Option<&'a Record> {
    group.iter().copied().fold(None, |best, animal| match best {
        Some(b) if int_field(animal, "weight") <= int_field(b, "weight") => Some(b),
        _ => Some(animal),
    })
}

fn records(records: impl IntoIterator<Item = Record>) -> Vec<Value> {
    records.into_iter().map(Value::Record).collect()
}

fn record_list(records: impl IntoIterator<Item = Record>) -> ResultValue {
    ResultValue::List(records.into_iter().map(ResultValue::Record).collect())
}

fn safari_riddles() -> Result<Vec<Riddle>, CatalogueError> {
    let schema = safari_animal_schema().map_err(|source| CatalogueError::Schema {
        id: "safari".to_string(),
        source,
    })?;
    let animals = base_animals(&schema).map_err(|source| CatalogueError::Schema {
        id: "safari".to_string(),
        source,
    })?;
    let element_type = ElementType::Record(Arc::clone(&schema));

    let riddle = |id: &str, description: &str, input: Vec<Value>, expected_output: ResultValue| Riddle {
        id: id.to_string(),
        description: description.to_string(),
        element_type: element_type.clone(),
        input,
        expected_output,
    };

    let mut by_age = animals.clone();
    by_age.sort_by_key(|animal| int_field(animal, "age"));

    let with_duplicates: Vec<Record> = [0, 1, 0, 3, 3].iter().map(|&i| animals[i].clone()).collect();
    let mut without_duplicates: Vec<Record> = Vec::new();
    for animal in &with_duplicates {
        if !without_duplicates.contains(animal) {
            without_duplicates.push(animal.clone());
        }
    }

    let shouted: Vec<ResultValue> = animals
        .iter()
        .map(|animal| ResultValue::Text(text_field(animal, "name").to_uppercase()))
        .collect();

    let all: Vec<&Record> = animals.iter().collect();
    let heaviest_overall = heaviest(&all).cloned().map(ResultValue::Record);

    let total_weight: i64 = animals.iter().map(|animal| int_field(animal, "weight")).sum();

    let predators = animals
        .iter()
        .filter(|animal| animal.get("predator") == Some(&Value::Boolean(true)))
        .cloned();

    let mut species: BTreeMap<Key, Vec<&Record>> = BTreeMap::new();
    for animal in &animals {
        species
            .entry(Key::Text(text_field(animal, "species")))
            .or_default()
            .push(animal);
    }
    let heaviest_per_species = species
        .into_iter()
        .filter_map(|(key, group)| heaviest(&group).cloned().map(|animal| (key, ResultValue::Record(animal))))
        .collect();

    let mut weight_ranges: BTreeMap<Key, Vec<ResultValue>> = BTreeMap::new();
    for animal in &animals {
        weight_ranges
            .entry(Key::Text(weight_range(int_field(animal, "weight")).to_string()))
            .or_default()
            .push(ResultValue::Record(animal.clone()));
    }
    let weight_ranges = weight_ranges
        .into_iter()
        .map(|(key, group)| (key, ResultValue::List(group)))
        .collect();

    let numbers = [5, 2, 9, 1, 2, 5];
    let mut sorted_numbers: Vec<i64> = numbers.to_vec();
    sorted_numbers.sort_unstable();
    sorted_numbers.dedup();

    let mut riddles = vec![
        riddle("1", "Order animals by age (youngest first)", records(animals.clone()), record_list(by_age)),
        riddle(
            "2",
            "Remove duplicate animals",
            records(with_duplicates),
            record_list(without_duplicates),
        ),
        riddle(
            "3",
            "Shout the name of every animal (upper case)",
            records(animals.clone()),
            ResultValue::List(shouted),
        ),
    ];

    if let Some(heaviest_overall) = heaviest_overall {
        riddles.push(riddle("4", "Find the heaviest animal", records(animals.clone()), heaviest_overall));
    }

    riddles.extend([
        riddle(
            "5",
            "Get the weight of all animals combined",
            records(animals.clone()),
            ResultValue::Number(Number::Integer(total_weight)),
        ),
        riddle("6", "Find all predators", records(animals.clone()), record_list(predators)),
        riddle(
            "7",
            "Find the heaviest animal per species",
            records(animals.clone()),
            ResultValue::Map(heaviest_per_species),
        ),
        riddle(
            "8",
            "Group animals into weight ranges: 0-200, 200-500, 500-1000, 1000+",
            records(animals.clone()),
            ResultValue::Map(weight_ranges),
        ),
        Riddle {
            id: "9".to_string(),
            description: "Sort the numbers and drop repeats".to_string(),
            element_type: ElementType::Number,
            input: numbers.iter().map(|&n| Value::Integer(n)).collect(),
            expected_output: ResultValue::List(
                sorted_numbers
                    .into_iter()
                    .map(|n| ResultValue::Number(Number::Integer(n)))
                    .collect(),
            ),
        },
    ]);

    Ok(riddles)
}
