//! Prompt resources and transcript rendering
//!
//! The prompt texts are opaque templates as far as the core is
//! concerned; the only structure this module knows about is the single
//! conversation placeholder in the summarization template.

use crate::llm::ChatMessage;

/// Token a patient can type to end the gathering phase early
pub const END_MARKER: &str = "END ASSESSMENT";

/// Closing message appended when the patient forces termination
pub const FORCED_CLOSE_MESSAGE: &str = "Thank you. The information gathering is complete. \
You can now generate the summary for your doctor.";

/// Greeting used when the opening completion fails
pub const FALLBACK_GREETING: &str = "Hello! I'm the Holistic Health Insight Assistant. \
To begin, could you please tell me about your main health concerns or symptoms \
you'd like to discuss today?";

/// Placeholder substituted with the rendered transcript
const CONVERSATION_PLACEHOLDER: &str = "{conversation_history_text}";

/// Fixed system prompt steering the assessment conversation
pub const SYSTEM_PROMPT: &str = r#"You are "Holistic Health Insight Assistant," an AI designed to help patients gather comprehensive information about their long-term health issues for their doctor.
Your primary goal is to conduct a holistic assessment through a guided conversation, covering physiological and psychological aspects. This information will help the patient's doctor understand potential root causes and consider appropriate specialist departments or types of care.

Your process for this conversation:
1.  Start by warmly introducing yourself and briefly explaining the purpose of this conversation: to gather information for their doctor. Emphasize that you are an AI assistant for information gathering and not a medical professional.
2.  Ask open-ended questions to understand the patient's main health concerns and symptoms.
3.  Systematically and gently guide the conversation to explore different areas relevant to long-term health: detailed symptom description, medical history, digestive health, energy and fatigue, sleep, mood and stress, pain, diet, physical activity, lifestyle factors, allergies, and environmental factors.
4.  For each area, ask clarifying follow-up questions as needed. Be curious and thorough but respectful of the patient's pace.
5.  Maintain an empathetic, patient, understanding, and non-judgmental tone throughout.
6.  IMPORTANT: You must NOT provide medical advice, diagnoses, interpretations of symptoms, or treatment recommendations. If asked, politely state that you are here to gather information for the patient's doctor.
7.  If the patient describes something that sounds like an acute medical emergency, gently and clearly advise them to contact their doctor, emergency services, or the nearest emergency department.
8.  Keep questions clear and reasonably concise. One main question per turn is best.
9.  When a question has a small set of natural answers, respond with ONLY a JSON object of the form {"question_text": "...", "input_type": "choice", "options": [{"value": "...", "example": "..."}], "allow_multiple": false} and include an "Other" option. For open questions use {"question_text": "...", "input_type": "text"}, or just ask in plain prose.
10. When you have gathered a good amount of information across several key areas, ask whether anything important remains uncovered.
11. To conclude the information-gathering phase, respond with {"question_text": "<your closing message>", "input_type": "end"}.

Remember, your sole purpose in this phase is to ask questions and gather information thoroughly and empathetically.
Start the conversation now by introducing yourself and asking about their main health concerns."#;

/// Template for the doctor-facing summary request
pub const SUMMARIZATION_TEMPLATE: &str = r#"Based on the following conversation with a patient:
--- START OF CONVERSATION ---
{conversation_history_text}
--- END OF CONVERSATION ---

Please generate a structured summary for their doctor. The summary MUST:
1.  Be written in a professional, objective tone suitable for a medical professional.
2.  Start with "Patient's Primary Stated Health Concerns:" followed by a concise list of the main issues the patient brought up.
3.  Organize the information by key health domains discussed (e.g., Detailed Symptom Review, Digestive Health, Energy & Sleep, Mood & Stress, Pain Profile, Diet & Nutrition, Lifestyle Factors, Relevant Medical History). Under each domain, list key symptoms and their characteristics using bullet points.
4.  Include a section "Potential Areas for Further Clinical Exploration:" highlighting significant patterns or co-occurring symptoms, framed as observations for the doctor to consider, NOT as diagnoses.
5.  Suggest 2-5 "Potential Referral or Consultation Pathways:" (types of specialists or allied health professionals), briefly justified by specific aspects of the patient's reported information.
6.  Include sections for "Current Medications:" and "Significant Past Medical History:" if mentioned; otherwise state "Not explicitly detailed by patient in this conversation."
7.  Conclude with a prominent disclaimer that the summary is based on patient self-reporting via an AI-assisted conversational interface, is for informational purposes, and does NOT constitute a medical diagnosis.

Structure the report clearly with headings and bullet points for readability.
Avoid conversational language; focus on factual reporting of what the patient stated."#;

/// System framing for the summarization call
pub const SUMMARIZER_SYSTEM_PROMPT: &str = "You are an AI assistant specialized in summarizing \
patient conversations into structured medical reports for doctors. Follow the user's \
instructions precisely for the report format.";

/// Render the transcript as `"Role: content"` lines joined by newline
pub fn render_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.display_name(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Substitute the rendered transcript into the summarization template
pub fn build_summary_prompt(messages: &[ChatMessage]) -> String {
    SUMMARIZATION_TEMPLATE.replace(CONVERSATION_PLACEHOLDER, &render_transcript(messages))
}

/// True when the text contains the end marker, case-insensitively
pub fn contains_end_marker(text: &str) -> bool {
    text.to_uppercase().contains(END_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;

    #[test]
    fn transcript_renders_capitalized_role_lines() {
        let messages = vec![
            ChatMessage::assistant("How are you?"),
            ChatMessage::user("Tired, mostly."),
        ];
        assert_eq!(
            render_transcript(&messages),
            "Assistant: How are you?\nUser: Tired, mostly."
        );
    }

    #[test]
    fn summary_prompt_substitutes_placeholder() {
        let messages = vec![ChatMessage::user("My back hurts.")];
        let prompt = build_summary_prompt(&messages);
        assert!(prompt.contains("User: My back hurts."));
        assert!(!prompt.contains(CONVERSATION_PLACEHOLDER));
    }

    #[test]
    fn end_marker_is_case_insensitive() {
        assert!(contains_end_marker("end assessment"));
        assert!(contains_end_marker("I think that's all - END ASSESSMENT."));
        assert!(contains_end_marker("End Assessment please"));
        assert!(!contains_end_marker("the assessment is going well"));
    }
}
