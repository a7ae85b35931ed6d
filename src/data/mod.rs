// ============================================================
// Data Pipeline
// ============================================================
// Everything between domain observations and model-ready
// tensors.
//
// The pipeline flows in this order:
//
//   ObservationSet (domain)
//       │
//       ▼
//   DigitFloatSerializer  → floats to digit token strings
//       │
//       ▼
//   FloatVocabulary       → strings to fixed-length token ids
//       │
//       ▼
//   FitBatcher            → token ids to [B, L, T] batches
//
// Each module is responsible for exactly one step, so each is
// independently testable and replaceable.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Digit-by-digit float ↔ token-string serialization
pub mod serializer;

/// Word-level vocabulary over serializer tokens and study text
pub mod vocab;

/// Observation sets + metadata to fixed-shape tensor batches
pub mod batcher;
