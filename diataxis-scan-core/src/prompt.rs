//! Fixed Diátaxis classification prompt.

pub const SYSTEM_PROMPT: &str = "You are an expert documentation analyst.";

const INSTRUCTIONS: &str = "The following documentation content is provided from a MkDocs file. \
Please analyze the content and classify it into the Diátaxis documentation framework quadrants:\n\
    - Explanation\n\
    - Tutorial\n\
    - How-To\n\
    - Reference\n\n\
For each quadrant, provide a percentage fit as an integer between 0 and 100 (without the '%' sign) \
that indicates how much the content aligns with that quadrant. Also, indicate the most dominant quadrant. \
Return the output in JSON format with keys 'dominant', 'explanation', 'tutorial', 'how_to', and 'reference'. \
In the returned output in JSON, ensure the values of 'dominant' is only one of the following, case-sensitive values: \
'explanation', 'tutorial', 'how_to', and 'reference'.\n\n\
Here is the documentation content:\n\n";

const CLOSING: &str = "\n\nEnsure your response is a valid JSON object.";

/// Instructions followed by `content` verbatim.
pub fn build_prompt(content: &str) -> String {
    let mut prompt = String::with_capacity(INSTRUCTIONS.len() + content.len() + CLOSING.len());
    prompt.push_str(INSTRUCTIONS);
    prompt.push_str(content);
    prompt.push_str(CLOSING);
    prompt
}
