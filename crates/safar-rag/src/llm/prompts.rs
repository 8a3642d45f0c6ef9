//! Prompt templates for the three LLM roles the engine uses: closed-set
//! intent labelling, schema-constrained entity extraction, and grounded
//! answer generation.

use crate::types::Intent;

pub fn intent_label_prompt(query: &str) -> String {
    let labels = Intent::all()
        .iter()
        .map(|i| i.label())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "You are an intent classification model.\n\
         \n\
         Given a user query, classify it into EXACTLY ONE of these intent labels:\n\
         {labels}\n\
         \n\
         INTENT DEFINITIONS:\n\
         - recommendation: User asks for suggestions, best options, or recommendations.\n\
         - booking: User wants to book, reserve, or arrange a hotel stay.\n\
         - visa_query: User asks about visa rules, travel documents, passport validity, entry restrictions.\n\
         - hotel_visa: User asks for hotels in countries they can enter visa-free.\n\
         - review_query: User asks for reviews, ratings, feedback, or opinions about a hotel.\n\
         - hotel_search: User wants to find hotels or search for accommodation options.\n\
         - generic_qa: Any general question not related to the above categories.\n\
         \n\
         REQUIREMENTS:\n\
         - Respond with ONLY the label.\n\
         - No explanation, no punctuation, no quotes.\n\
         \n\
         User query: {query}\n"
    )
}

pub const EXTRACTION_SCHEMA_PROMPT: &str = "\
You are a strict entity extractor for a hotel booking assistant.
You MUST output ONLY a valid JSON object following the schema below.
No text, no explanations, no backticks.

SCHEMA:
{
  \"cities\": [\"City\", ...],
  \"countries\": [\"Country\", ...],
  \"hotels\": [\"Hotel Name\", ...],
  \"origin_country\": [\"Country\", ...],
  \"destination_country\": [\"Country\", ...],
  \"traveller_type\": \"solo|family|couple|business|group|null\",
  \"age_group\": \"18-24|25-34|35-44|45-54|55+|null\",
  \"gender\": [\"male\",\"female\"] or [],
  \"rating\": number or null,
  \"confidence\": {
      \"cities\": float,
      \"countries\": float,
      \"hotels\": float,
      \"origin_country\": float,
      \"destination_country\": float,
      \"traveller_type\": float,
      \"age_group\": float,
      \"gender\": float,
      \"rating\": float
  }
}

STRICT RULES:
1. DO NOT guess optional fields.
   - traveller_type, age_group, gender, rating MUST be null/empty unless explicitly stated.
2. ALWAYS infer countries from cities (Cairo -> Egypt, London -> United Kingdom).
3. Infer origin vs destination logically:
   - \"from X\", \"I live in X\", \"coming from X\" -> origin_country = X.
   - \"in X\", \"to X\", \"going to X\", \"for X\" -> destination_country = X.
4. Ratings: \"4 star\" -> 8.0; \"above 8\", \"at least 8\", \"8/10\" -> 8.0.
   Only extract a rating if explicitly provided.
5. Only extract hotel names mentioned directly. Do NOT invent hotel names.
6. Output must ALWAYS be valid JSON matching the schema.
";

pub fn entity_extraction_prompt(query: &str) -> String {
    format!("{EXTRACTION_SCHEMA_PROMPT}\nUser query: \"{query}\"\n")
}

pub fn grounded_answer_prompt(context_text: &str, query: &str) -> String {
    format!(
        "You are a travel assistant answering questions about hotels, reviews, and visas.\n\
         Use ONLY the knowledge-graph context below. If the context does not contain\n\
         the answer, say you do not have that information. Do not invent hotels,\n\
         scores, or visa rules.\n\
         \n\
         ===== CONTEXT =====\n\
         {context_text}\n\
         ===== QUESTION =====\n\
         {query}\n\
         ===== ANSWER =====\n"
    )
}
