//! Fixed system instructions sent with each chat completion.
//!
//! The source publishes in Traditional Chinese, so the instructions are too.

/// Rate a headline's relevance to price changes of everyday consumer goods.
/// The model must answer with exactly one of `high`, `medium`, `low`.
pub const RELEVANCE: &str = "你是一個關鍵度評估機器人，請評估新聞標題是否與「民生用品的價格變化」相關，並給予'high'、'medium'、'low'評價。(僅需回答'high'、'medium'、'low'三個詞之一)";

/// Summarize impact (`影響`) and main cause (`原因`), about 50 characters each, as JSON.
pub const SUMMARY: &str = "你是一個新聞摘要生成機器人，請統整新聞中提及的影響及主要原因 (影響、原因各50個字，請以json格式回答 {'影響': '...', '原因': '...'})";

/// Pull search keywords out of a free-form request, space separated.
pub const KEYWORDS: &str = "你是一個關鍵字提取機器人，用戶將會輸入一段文字，表示其希望看見的新聞內容，請提取出用戶希望看見的關鍵字，請截取最重要的關鍵字即可，避免出現「新聞」、「資訊」等混淆搜尋引擎的字詞。(僅須回答關鍵字，若有多個關鍵字，請以空格分隔)";

/// JSON key carrying the impact field in the summary reply.
pub const IMPACT_KEY: &str = "影響";
/// JSON key carrying the cause field in the summary reply.
pub const CAUSE_KEY: &str = "原因";
