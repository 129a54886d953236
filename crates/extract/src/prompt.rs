pub fn build_extraction_prompt(chunk_text: &str) -> String {
    format!(
        r#"Extract a knowledge graph of entities and relationships from the following text.

INSTRUCTIONS:
1. Identify key entities (people, organizations, locations, concepts, technologies, events)
2. Extract relationships between those entities
3. Output ONLY valid JSON, nothing else
4. Use the exact schema below

SCHEMA:
{{
  "entities": [
    {{"id": "Entity Name", "type": "Person"}}
  ],
  "relations": [
    {{"source": "Entity Name", "target": "Other Entity", "type": "WORKS_FOR"}}
  ]
}}

RULES:
- The entity id is the entity's name exactly as it should be displayed
- Use the same id every time the same entity is mentioned
- Entity types are short capitalized labels such as Person, Organization, Location, Concept
- Relation source and target must be ids from the entities list
- Relation types are short uppercase verbs joined by underscores: WORKS_FOR, LOCATED_IN, PART_OF
- Output ONLY the JSON object, no markdown, no explanations

TEXT:
{}

JSON OUTPUT:"#,
        chunk_text
    )
}

pub fn build_retry_prompt(invalid_json: &str) -> String {
    format!(
        r#"The following JSON is invalid:

{}

Fix this JSON. Output only valid JSON with no markdown formatting, no code blocks, no explanations. Just the raw JSON object."#,
        invalid_json
    )
}
