//! Instruction prompts for the augmentation service.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing how the service is asked to place
//!    illustrations requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the instruction directly
//!    without calling a real service, so a drifting marker syntax is caught
//!    immediately.
//!
//! Callers can override the instruction via
//! [`crate::config::IllustrationConfig::instruction`]; the template here is
//! used only when no override is provided.

/// Default augmentation instruction template.
///
/// The placeholders `{book}` and `{document}` are substituted by
/// [`augmentation_instruction`]. The marker syntax named here must match
/// [`crate::pipeline::markers`], since extraction only recognises that exact
/// token.
pub const AUGMENT_INSTRUCTION_TEMPLATE: &str = "\
You are given the content of the section {document} from the book {book}. \
Find the best places to insert illustrations and insert each one as a comment \
of the form <!-- illustration: description --> on its own line, where \
description depicts the scene in vivid language in exactly one sentence. \
Illustrations should be helpful for the reader and provide valuable insight \
into the subject. Do not alter the surrounding text in any other way. Return \
the full section content with the markers inserted.";

/// Build the instruction for one document.
///
/// `book` and `document` are display names (file names, not full paths); the
/// service only uses them as context for choosing relevant imagery.
pub fn augmentation_instruction(book: &str, document: &str) -> String {
    AUGMENT_INSTRUCTION_TEMPLATE
        .replace("{book}", book)
        .replace("{document}", document)
}
