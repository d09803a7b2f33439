// All LLM prompt constants for the website summarizer.

/// System prompt for website summaries. Whitespace runs are collapsed before sending.
pub const SUMMARIZE_SYSTEM: &str = "You are an assistant whose job is to summarize the content of a website.
            What you will do is to analyze the content of the given website then to give a short but informative
            summary about it. Your response should answer the following questions:
            1. Globally, what is the website about?
            2. If the website is about a company or organization then what is that company/organization and what does it do?
            Else if it is about a person or a group of people, who are they and what are they doing?
            3. What is the domain or sector that the company/organization/person works on?
            4. What are the main activities of the company/organization/person?
            5. Does it contain announcement or news? If yes, analyze and summarize it.
            You should response in markdown.";

/// User prompt. Page fields are inserted verbatim, braces included.
pub fn summarize_prompt(url: &str, title: &str, content: &str) -> String {
    format!(
        "Here is the website that you need to analyze and summarize: {url}. \
         Its title is {title}. Its content is as following: \n{content}."
    )
}
